//! The sibling files of one shapefile and the coordinator that arbitrates access to them.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use geoshp_core::config::DEFAULT_LOCK_RETRY_MS;
use geoshp_core::error::{Result, ShpError};

use crate::lock::{LockHandle, LockMode, LockOwner, LockStatus, LockTable, TryLock};

/// Members of a shapefile set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShpFileType {
    Shp,
    Shx,
    Dbf,
    Prj,
    Cpg,
    ShpXml,
}

impl ShpFileType {
    pub const COUNT: usize = 6;

    pub const ALL: [ShpFileType; ShpFileType::COUNT] = [
        ShpFileType::Shp,
        ShpFileType::Shx,
        ShpFileType::Dbf,
        ShpFileType::Prj,
        ShpFileType::Cpg,
        ShpFileType::ShpXml,
    ];

    pub fn index(&self) -> usize {
        match self {
            ShpFileType::Shp => 0,
            ShpFileType::Shx => 1,
            ShpFileType::Dbf => 2,
            ShpFileType::Prj => 3,
            ShpFileType::Cpg => 4,
            ShpFileType::ShpXml => 5,
        }
    }

    /// Lower-case extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ShpFileType::Shp => "shp",
            ShpFileType::Shx => "shx",
            ShpFileType::Dbf => "dbf",
            ShpFileType::Prj => "prj",
            ShpFileType::Cpg => "cpg",
            ShpFileType::ShpXml => "shp.xml",
        }
    }

    /// Identify a member by the end of a file name, ignoring case
    pub fn from_file_name(name: &str) -> Option<(ShpFileType, &str)> {
        let lower = name.to_ascii_lowercase();
        // .shp.xml must be tested before .shp
        let mut candidates = ShpFileType::ALL;
        candidates.sort_by_key(|t| std::cmp::Reverse(t.extension().len()));
        candidates.into_iter().find_map(|file_type| {
            let suffix = format!(".{}", file_type.extension());
            lower
                .ends_with(&suffix)
                .then(|| (file_type, &name[name.len() - suffix.len() + 1..]))
        })
    }
}

/// Locates the members of a shapefile set and coordinates locking across them.
///
/// Clones share one lock table, so every reader and writer working on the
/// same set must be created from the same `ShpFiles` or one of its clones.
#[derive(Debug, Clone)]
pub struct ShpFiles {
    base: PathBuf,
    upper_case: bool,
    locks: Arc<LockTable>,
    retry: Duration,
}

impl ShpFiles {
    /// Derive the set from any member path, `file://` URL, or the extension-less base
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = path.as_ref();
        let path = match raw.to_str().and_then(|s| s.strip_prefix("file://")) {
            Some(stripped) => PathBuf::from(stripped),
            None => raw.to_path_buf(),
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ShpError::InvalidPath {
                path: path.clone(),
                reason: "Path has no file name".to_string(),
            })?
            .to_string();

        let (stem, upper_case) = match ShpFileType::from_file_name(&file_name) {
            Some((_, ext)) => {
                let upper_case = ext.chars().any(|c| c.is_ascii_uppercase());
                (file_name[..file_name.len() - ext.len() - 1].to_string(), upper_case)
            }
            None if Path::new(&file_name).extension().is_none() => (file_name.clone(), false),
            None => {
                return Err(ShpError::InvalidPath {
                    path,
                    reason: "Not a member of a shapefile set (.shp, .shx, .dbf, .prj, .cpg, .shp.xml)"
                        .to_string(),
                })
            }
        };

        if stem.is_empty() {
            return Err(ShpError::InvalidPath { path, reason: "Empty shapefile name".to_string() });
        }

        Ok(Self {
            base: path.with_file_name(stem),
            upper_case,
            locks: Arc::new(LockTable::default()),
            retry: Duration::from_millis(DEFAULT_LOCK_RETRY_MS),
        })
    }

    /// Set the polling interval used while waiting for a lock
    pub fn with_lock_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Type name shared by all members, i.e. the file stem
    pub fn type_name(&self) -> String {
        self.base.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string()
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn candidate(&self, file_type: ShpFileType, upper_case: bool) -> PathBuf {
        let ext = if upper_case {
            file_type.extension().to_ascii_uppercase()
        } else {
            file_type.extension().to_string()
        };
        let mut name = self.base.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }

    /// Location of a member. Prefers the case convention of the path the set was
    /// opened with, but resolves to the other case when only that one exists.
    pub fn path(&self, file_type: ShpFileType) -> PathBuf {
        let preferred = self.candidate(file_type, self.upper_case);
        if preferred.exists() {
            return preferred;
        }
        let alternate = self.candidate(file_type, !self.upper_case);
        if alternate.exists() {
            alternate
        } else {
            preferred
        }
    }

    pub fn exists(&self, file_type: ShpFileType) -> bool {
        self.path(file_type).exists()
    }

    fn handle(&self, file_type: ShpFileType, mode: LockMode, owner: LockOwner) -> LockHandle {
        LockHandle::new(Arc::clone(&self.locks), file_type, mode, owner, self.path(file_type))
    }

    /// Block until a shared read lock is granted
    pub fn acquire_read(&self, file_type: ShpFileType, owner: LockOwner) -> LockHandle {
        self.locks.acquire(file_type, LockMode::Read, owner, self.retry);
        self.handle(file_type, LockMode::Read, owner)
    }

    /// Block until an exclusive write lock is granted
    pub fn acquire_write(&self, file_type: ShpFileType, owner: LockOwner) -> LockHandle {
        self.locks.acquire(file_type, LockMode::Write, owner, self.retry);
        self.handle(file_type, LockMode::Write, owner)
    }

    pub fn try_acquire_read(&self, file_type: ShpFileType, owner: LockOwner) -> TryLock<LockHandle> {
        if self.locks.try_acquire(file_type, LockMode::Read, owner) {
            TryLock::Acquired(self.handle(file_type, LockMode::Read, owner))
        } else {
            TryLock::Locked
        }
    }

    pub fn try_acquire_write(&self, file_type: ShpFileType, owner: LockOwner) -> TryLock<LockHandle> {
        if self.locks.try_acquire(file_type, LockMode::Write, owner) {
            TryLock::Acquired(self.handle(file_type, LockMode::Write, owner))
        } else {
            TryLock::Locked
        }
    }

    /// Release a read lock. Fails if `owner` does not hold it.
    pub fn unlock_read(&self, handle: &mut LockHandle, owner: LockOwner) -> Result<()> {
        handle.release_as(LockMode::Read, owner)
    }

    /// Release a write lock. Fails if `owner` does not hold it.
    pub fn unlock_write(&self, handle: &mut LockHandle, owner: LockOwner) -> Result<()> {
        handle.release_as(LockMode::Write, owner)
    }

    pub fn lock_status(&self, file_type: ShpFileType) -> LockStatus {
        self.locks.status(file_type)
    }

    /// Open a member for reading under a read lock
    pub fn open_read(&self, file_type: ShpFileType, owner: LockOwner) -> Result<LockedFile> {
        let handle = self.acquire_read(file_type, owner);
        let file = File::open(handle.path()).map_err(|e| open_error(e, handle.path()))?;
        Ok(LockedFile { file, handle })
    }

    /// Create or truncate a member for writing under a write lock
    pub fn open_write(&self, file_type: ShpFileType, owner: LockOwner) -> Result<LockedFile> {
        let handle = self.acquire_write(file_type, owner);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(handle.path())
            .map_err(|e| open_error(e, handle.path()))?;
        Ok(LockedFile { file, handle })
    }

    /// Read a text member under a read lock, `None` if it does not exist
    pub fn read_text(&self, file_type: ShpFileType, owner: LockOwner) -> Result<Option<String>> {
        if !self.exists(file_type) {
            return Ok(None);
        }
        let mut file = self.open_read(file_type, owner)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(Some(content))
    }

    /// Replace a member with the content of `source`. The caller must hold the write lock.
    pub(crate) fn replace_from(&self, lock: &LockHandle, source: &Path) -> Result<()> {
        debug_assert_eq!(lock.mode(), LockMode::Write);
        fs::copy(source, lock.path())?;
        Ok(())
    }

    /// Delete a member under a write lock; missing files are ignored
    pub fn delete(&self, file_type: ShpFileType, owner: LockOwner) -> Result<()> {
        let handle = self.acquire_write(file_type, owner);
        match fs::remove_file(handle.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn open_error(error: io::Error, path: &Path) -> ShpError {
    if error.kind() == io::ErrorKind::NotFound {
        ShpError::FileNotFound { path: path.to_path_buf() }
    } else {
        ShpError::Io(error)
    }
}

/// A member file opened together with the lock that guards it
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    handle: LockHandle,
}

impl LockedFile {
    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
