//! Reference-counted read/write locks over the files of one shapefile set.
//!
//! Lock state lives in a fixed arena indexed by file type. Ownership is keyed
//! by explicit owner tokens rather than thread identity, so a reader or writer
//! may move between threads while it holds its locks.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::files::ShpFileType;

/// Opaque identity of a lock holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner(Uuid);

impl LockOwner {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// Outcome of a non-blocking acquisition attempt
#[derive(Debug)]
pub enum TryLock<T> {
    Acquired(T),
    /// A conflicting lock is held by another owner
    Locked,
}

impl<T> TryLock<T> {
    pub fn is_acquired(&self) -> bool {
        matches!(self, TryLock::Acquired(_))
    }

    pub fn acquired(self) -> Option<T> {
        match self {
            TryLock::Acquired(value) => Some(value),
            TryLock::Locked => None,
        }
    }
}

#[derive(Debug, Default)]
struct FileLockState {
    readers: HashMap<LockOwner, usize>,
    writer: Option<(LockOwner, usize)>,
}

impl FileLockState {
    fn can_grant(&self, mode: LockMode, owner: LockOwner) -> bool {
        let writer_ok = self.writer.map_or(true, |(w, _)| w == owner);
        match mode {
            LockMode::Read => writer_ok,
            // A sole reader may upgrade to writer
            LockMode::Write => writer_ok && self.readers.keys().all(|r| *r == owner),
        }
    }

    fn grant(&mut self, mode: LockMode, owner: LockOwner) {
        match mode {
            LockMode::Read => *self.readers.entry(owner).or_insert(0) += 1,
            LockMode::Write => match &mut self.writer {
                Some((_, count)) => *count += 1,
                None => self.writer = Some((owner, 1)),
            },
        }
    }

    fn release(&mut self, mode: LockMode, owner: LockOwner) -> Result<(), &'static str> {
        match mode {
            LockMode::Read => {
                let count = self.readers.get_mut(&owner).ok_or("no read lock held by this owner")?;
                *count -= 1;
                if *count == 0 {
                    self.readers.remove(&owner);
                }
            }
            LockMode::Write => match &mut self.writer {
                Some((w, count)) if *w == owner => {
                    *count -= 1;
                    if *count == 0 {
                        self.writer = None;
                    }
                }
                _ => return Err("no write lock held by this owner"),
            },
        }
        Ok(())
    }
}

/// Lock counts for one file, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockStatus {
    pub readers: usize,
    pub write_locked: bool,
}

/// Monitor guarding the lock state of every file in a set
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    states: Mutex<[FileLockState; ShpFileType::COUNT]>,
    released: Condvar,
}

impl LockTable {
    // Grant and release are single-step updates, so a poisoned state is still consistent.
    fn states(&self) -> MutexGuard<'_, [FileLockState; ShpFileType::COUNT]> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the lock is granted, re-checking at least every `retry`
    pub(crate) fn acquire(&self, file_type: ShpFileType, mode: LockMode, owner: LockOwner, retry: Duration) {
        let mut states = self.states();
        let mut attempts: u64 = 0;
        loop {
            let state = &mut states[file_type.index()];
            if state.can_grant(mode, owner) {
                state.grant(mode, owner);
                if attempts > 0 {
                    tracing::debug!("Acquired {:?} lock on .{} after {} retries", mode, file_type.extension(), attempts);
                }
                return;
            }

            attempts += 1;
            if attempts == 1 || attempts % 50 == 0 {
                tracing::debug!(
                    "Waiting for {:?} lock on .{} (owner {}, attempt {})",
                    mode,
                    file_type.extension(),
                    owner,
                    attempts
                );
            }
            states = self
                .released
                .wait_timeout(states, retry)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    pub(crate) fn try_acquire(&self, file_type: ShpFileType, mode: LockMode, owner: LockOwner) -> bool {
        let mut states = self.states();
        let state = &mut states[file_type.index()];
        if state.can_grant(mode, owner) {
            state.grant(mode, owner);
            true
        } else {
            false
        }
    }

    pub(crate) fn release(
        &self,
        file_type: ShpFileType,
        mode: LockMode,
        owner: LockOwner,
    ) -> Result<(), &'static str> {
        let mut states = self.states();
        states[file_type.index()].release(mode, owner)?;
        drop(states);
        self.released.notify_all();
        Ok(())
    }

    pub(crate) fn status(&self, file_type: ShpFileType) -> LockStatus {
        let states = self.states();
        let state = &states[file_type.index()];
        LockStatus {
            readers: state.readers.values().sum(),
            write_locked: state.writer.is_some(),
        }
    }
}

/// A granted lock. Released on drop unless already unlocked explicitly.
#[derive(Debug)]
pub struct LockHandle {
    table: Arc<LockTable>,
    file_type: ShpFileType,
    mode: LockMode,
    owner: LockOwner,
    path: PathBuf,
    released: bool,
}

impl LockHandle {
    pub(crate) fn new(
        table: Arc<LockTable>,
        file_type: ShpFileType,
        mode: LockMode,
        owner: LockOwner,
        path: PathBuf,
    ) -> Self {
        Self { table, file_type, mode, owner, path, released: false }
    }

    pub fn file_type(&self) -> ShpFileType {
        self.file_type
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn owner(&self) -> LockOwner {
        self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release on behalf of `owner`; fails without touching the lock if `owner` does not hold it
    pub(crate) fn release_as(&mut self, mode: LockMode, owner: LockOwner) -> geoshp_core::Result<()> {
        let reason = if self.released {
            Some("lock already released")
        } else if self.mode != mode {
            Some(match mode {
                LockMode::Read => "handle holds a write lock, not a read lock",
                LockMode::Write => "handle holds a read lock, not a write lock",
            })
        } else if self.owner != owner {
            Some("owner token does not match the lock holder")
        } else {
            self.table.release(self.file_type, mode, owner).err()
        };

        if let Some(reason) = reason {
            tracing::error!("Rejected unlock of {} by {}: {}", self.path.display(), owner, reason);
            return Err(geoshp_core::ShpError::LockOwnership {
                path: self.path.clone(),
                owner: owner.to_string(),
                reason: reason.to_string(),
            });
        }

        self.released = true;
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released {
            if let Err(reason) = self.table.release(self.file_type, self.mode, self.owner) {
                tracing::error!("Failed to release lock on {}: {}", self.path.display(), reason);
            }
        }
    }
}
