//! In-place updates through temporary sibling files.

use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{AttributeValue, Feature, FeatureId, FidMapper, Geometry, Schema, ShapeType, ShapefileFidMapper};

use crate::datastore::ShapefileDataStore;
use crate::dbf::{DbaseHeader, DbaseReader, DbaseWarning, DbaseWriter, ROW_ACTIVE, ROW_DELETED};
use crate::files::{LockedFile, ShpFileType, ShpFiles};
use crate::lock::LockOwner;
use crate::set_writer::ShapefileSetWriter;
use crate::shp::{RawRecord, ShapefileReader, ShapefileWriter};

/// A source record read ahead of the caller
#[derive(Debug)]
struct SourceRecord {
    index: usize,
    shape: RawRecord,
    row: Vec<u8>,
}

#[derive(Debug)]
struct Current {
    feature: Feature,
    /// Stored bytes and decoded form of an existing feature
    source: Option<(SourceRecord, Feature)>,
}

/// Walks the existing features of a set, letting the caller keep, change or
/// remove each one, then append new ones.
///
/// Output goes to temporary files next to the originals. `close` replaces the
/// originals; dropping the writer without closing leaves them untouched and
/// deletes the temporaries. Unchanged features are copied as raw bytes.
#[derive(Debug)]
pub struct FeatureWriter {
    files: ShpFiles,
    owner: LockOwner,
    schema: Schema,
    fids: ShapefileFidMapper,
    source_type: ShapeType,
    shapes: ShapefileReader<LockedFile>,
    rows: Option<DbaseReader<LockedFile>>,
    lookahead: Option<SourceRecord>,
    next_index: usize,
    target: ShapefileSetWriter<NamedTempFile>,
    current: Option<Current>,
}

impl FeatureWriter {
    pub(crate) fn open(store: &ShapefileDataStore) -> Result<Self> {
        let files = store.files().clone();
        let owner = LockOwner::new();
        let options = store.options();

        let shapes = store.open_shapes(owner)?;
        let rows = store.open_rows(owner)?;
        let encoding = match &rows {
            Some(rows) => rows.encoding(),
            None => store.encoding(owner)?,
        };
        let header = rows.as_ref().map_or_else(|| DbaseHeader::new(Vec::new()), |r| r.header().clone());
        let schema = header.to_schema(&files.type_name());
        let source_type = shapes.shape_type();

        let shapes_out = ShapefileWriter::new(temp_file(&files, "shp")?, temp_file(&files, "shx")?)?
            .with_shape_type(source_type);
        let rows_out = DbaseWriter::new(temp_file(&files, "dbf")?, header, encoding, options.overflow)?;
        debug!("Opened feature writer on {} (owner {})", files.path(ShpFileType::Shp).display(), owner);

        Ok(Self {
            fids: store.fid_mapper().clone(),
            files,
            owner,
            schema,
            source_type,
            shapes,
            rows,
            lookahead: None,
            next_index: 0,
            target: ShapefileSetWriter::new(shapes_out, rows_out),
            current: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Values shortened to fit their DBF fields so far
    pub fn warnings(&self) -> &[DbaseWarning] {
        self.target.warnings()
    }

    /// Whether an existing feature remains; deleted rows are passed over
    pub fn has_next(&mut self) -> Result<bool> {
        if self.lookahead.is_some() {
            return Ok(true);
        }
        while let Some(shape) = self.shapes.next_raw()? {
            let index = self.next_index;
            self.next_index += 1;

            let row = match self.rows.as_mut() {
                Some(rows) => rows.read_raw_row()?.ok_or(ShpError::RecordCountMismatch {
                    shapes: self.next_index as u32,
                    rows: rows.row_count() as u32,
                })?,
                None => vec![ROW_ACTIVE],
            };
            if row[0] == ROW_DELETED {
                debug!("Dropping deleted row {}", index + 1);
                continue;
            }
            self.lookahead = Some(SourceRecord { index, shape, row });
            return Ok(true);
        }

        if let Some(rows) = self.rows.as_ref().filter(|r| r.has_next()) {
            return Err(ShpError::RecordCountMismatch {
                shapes: self.next_index as u32,
                rows: rows.row_count() as u32,
            });
        }
        Ok(false)
    }

    /// Move to the next existing feature, or to a new empty one once they run out.
    ///
    /// A current feature that was neither written nor removed is written first.
    pub fn next(&mut self) -> Result<&mut Feature> {
        self.flush_current()?;

        let current = if self.has_next()? {
            let source = self.lookahead.take().ok_or(ShpError::NoCurrentFeature)?;
            let record = source.shape.decode(self.source_type)?;
            let attributes = match &self.rows {
                Some(rows) => rows.decode(source.index, &source.row).values,
                None => Vec::new(),
            };
            let original = Feature { fid: self.fids.fid_for(source.index), geometry: record.geometry, attributes };
            Current { feature: original.clone(), source: Some((source, original)) }
        } else {
            let fid = self.fids.fid_for(self.target.record_count() as usize);
            let attributes = vec![AttributeValue::Null; self.schema.value_count()];
            Current { feature: Feature { fid, geometry: Geometry::Null, attributes }, source: None }
        };

        Ok(&mut self.current.insert(current).feature)
    }

    /// Keep the current feature, with any changes made to it
    pub fn write(&mut self) -> Result<()> {
        let current = self.current.take().ok_or(ShpError::NoCurrentFeature)?;
        match current.source {
            Some((source, original)) if original == current.feature => {
                self.target.write_raw(&source.shape.content, &source.row)?;
            }
            _ => {
                self.target.write_feature(&current.feature.geometry, &current.feature.attributes)?;
            }
        }
        Ok(())
    }

    /// Drop the current feature from the output
    pub fn remove(&mut self) -> Result<()> {
        let current = self.current.take().ok_or(ShpError::NoCurrentFeature)?;
        debug!("Removed feature {}", current.feature.fid);
        Ok(())
    }

    /// Append a feature after every remaining existing one
    pub fn append(&mut self, feature: Feature) -> Result<FeatureId> {
        self.flush_current()?;
        self.transfer_remaining()?;
        let fid = self.fids.fid_for(self.target.record_count() as usize);
        self.target.write_feature(&feature.geometry, &feature.attributes)?;
        Ok(fid)
    }

    fn flush_current(&mut self) -> Result<()> {
        if self.current.is_some() {
            self.write()?;
        }
        Ok(())
    }

    fn transfer_remaining(&mut self) -> Result<()> {
        while self.has_next()? {
            if let Some(source) = self.lookahead.take() {
                self.target.write_raw(&source.shape.content, &source.row)?;
            }
        }
        Ok(())
    }

    /// Finish the output and replace the original files with it
    pub fn close(mut self) -> Result<()> {
        self.flush_current()?;
        self.transfer_remaining()?;
        self.target.close()?;

        let written = self.target.record_count();
        let Self { files, owner, shapes, rows, target, .. } = self;
        let (shp, shx, dbf) = target.into_inner();

        // no read lock of this session may be held while waiting for the write locks
        drop(shapes);
        drop(rows);
        let locks: Vec<_> = [ShpFileType::Shp, ShpFileType::Shx, ShpFileType::Dbf]
            .into_iter()
            .map(|file_type| files.acquire_write(file_type, owner))
            .collect();

        for (lock, temp) in locks.iter().zip([&shp, &shx, &dbf]) {
            files.replace_from(lock, temp.path())?;
        }
        info!("Rewrote {} with {} records", files.path(ShpFileType::Shp).display(), written);
        Ok(())
    }
}

fn temp_file(files: &ShpFiles, extension: &str) -> Result<NamedTempFile> {
    let dir = match files.base().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(tempfile::Builder::new()
        .prefix(&format!(".{}-", files.type_name()))
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?)
}
