//! The shapefile datastore: one file set, read and rewritten as features.

use encoding_rs::Encoding;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use geoshp_core::config::StoreOptions;
use geoshp_core::crs::{CrsHandle, CrsRegistry};
use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{
    AttributeDescriptor, AttributeKind, Envelope, Feature, FeatureId, FidMapper, Query, Schema, ShapeType,
    ShapefileFidMapper,
};

use crate::dbf::header::GEOMETRY_NAME;
use crate::dbf::{DbaseHeader, DbaseReader, DbaseWriter, ROW_ACTIVE, ROW_DELETED};
use crate::feature_reader::FeatureReader;
use crate::feature_writer::FeatureWriter;
use crate::files::{LockedFile, ShpFileType, ShpFiles};
use crate::lock::LockOwner;
use crate::set_writer::ShapefileSetWriter;
use crate::shp::{IndexReader, ShapefileHeader, ShapefileReader, ShapefileWriter};
use crate::sidecar::{self, ShpXmlMetadata};

/// Outcome of `ShapefileDataStore::check_consistency`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    pub shape_records: usize,
    pub index_entries: Option<usize>,
    pub rows: Option<usize>,
    pub problems: Vec<String>,
}

impl ConsistencyReport {
    const MAX_PROBLEMS: usize = 50;

    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }

    fn note(&mut self, problem: String) {
        if self.problems.len() < Self::MAX_PROBLEMS {
            self.problems.push(problem);
        }
    }
}

/// Access to one shapefile set.
///
/// Every reader and writer opened here gets its own owner token and its own
/// file handles; they coordinate through the lock table shared by the set.
#[derive(Debug, Clone)]
pub struct ShapefileDataStore {
    files: ShpFiles,
    options: StoreOptions,
    registry: Arc<CrsRegistry>,
    fids: ShapefileFidMapper,
}

impl ShapefileDataStore {
    /// Bind to the set containing `path`. The files need not exist until read.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let files = ShpFiles::from_path(path)?.with_lock_retry(options.lock_retry);
        let fids = ShapefileFidMapper::new(files.type_name());
        Ok(Self { files, options, registry: Arc::new(CrsRegistry::new()), fids })
    }

    /// Share a CRS registry with other stores
    pub fn with_crs_registry(mut self, registry: Arc<CrsRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn files(&self) -> &ShpFiles {
        &self.files
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn type_name(&self) -> String {
        self.files.type_name()
    }

    pub(crate) fn fid_mapper(&self) -> &ShapefileFidMapper {
        &self.fids
    }

    /// DBF charset: a `.cpg` sidecar wins unless the configuration chose one explicitly
    pub(crate) fn encoding(&self, owner: LockOwner) -> Result<&'static Encoding> {
        if self.options.charset_is_default {
            if let Some(encoding) = sidecar::read_cpg(&self.files, owner)? {
                return Ok(encoding);
            }
        }
        Ok(self.options.encoding)
    }

    pub(crate) fn open_shapes(&self, owner: LockOwner) -> Result<ShapefileReader<LockedFile>> {
        ShapefileReader::new(self.files.open_read(ShpFileType::Shp, owner)?)
    }

    /// DBF reader, `None` when the set has no attribute table
    pub(crate) fn open_rows(&self, owner: LockOwner) -> Result<Option<DbaseReader<LockedFile>>> {
        if !self.files.exists(ShpFileType::Dbf) {
            return Ok(None);
        }
        let encoding = self.encoding(owner)?;
        Ok(Some(DbaseReader::new(self.files.open_read(ShpFileType::Dbf, owner)?, encoding)?))
    }

    fn read_header(&self, file_type: ShpFileType) -> Result<ShapefileHeader> {
        let mut file = self.files.open_read(file_type, LockOwner::new())?;
        ShapefileHeader::read(&mut file, file_type.extension())
    }

    /// Geometry column followed by the DBF columns
    pub fn schema(&self) -> Result<Schema> {
        let owner = LockOwner::new();
        match self.open_rows(owner)? {
            Some(rows) => Ok(rows.header().to_schema(&self.type_name())),
            None => Ok(Schema::new(self.type_name())
                .attribute(AttributeDescriptor::new(GEOMETRY_NAME, AttributeKind::Geometry))),
        }
    }

    pub fn shape_type(&self) -> Result<ShapeType> {
        Ok(self.read_header(ShpFileType::Shp)?.shape_type)
    }

    /// Bounds declared by the `.shp` header
    pub fn bounds(&self) -> Result<Envelope> {
        Ok(self.read_header(ShpFileType::Shp)?.bounds)
    }

    /// Record count from the DBF header, else the `.shx`, else a scan of the `.shp`.
    ///
    /// Rows flagged as deleted are included.
    pub fn count(&self) -> Result<usize> {
        let owner = LockOwner::new();
        if let Some(rows) = self.open_rows(owner)? {
            return Ok(rows.row_count());
        }
        if self.files.exists(ShpFileType::Shx) {
            return Ok(IndexReader::new(self.files.open_read(ShpFileType::Shx, owner)?)?.count());
        }
        let mut shapes = self.open_shapes(owner)?;
        let mut count = 0;
        while shapes.skip_record()? {
            count += 1;
        }
        Ok(count)
    }

    /// CRS declared by the `.prj` member, resolved through the registry
    pub fn crs(&self) -> Result<Option<Arc<CrsHandle>>> {
        Ok(sidecar::read_prj(&self.files, LockOwner::new())?.and_then(|wkt| self.registry.lookup(&wkt)))
    }

    /// `.shp.xml` metadata, if present and readable
    pub fn metadata(&self) -> Result<Option<ShpXmlMetadata>> {
        sidecar::read_shp_xml(&self.files, LockOwner::new())
    }

    /// Create an empty set for `schema`, replacing any existing files.
    ///
    /// Geometry columns are not stored in the DBF. The shape type binds to the
    /// first geometry written later.
    pub fn create_schema(&self, schema: &Schema, crs_wkt: Option<&str>) -> Result<()> {
        let owner = LockOwner::new();
        let header = DbaseHeader::from_schema(schema)?;

        let shp = self.files.open_write(ShpFileType::Shp, owner)?;
        let shx = self.files.open_write(ShpFileType::Shx, owner)?;
        let dbf = self.files.open_write(ShpFileType::Dbf, owner)?;
        let mut writer = ShapefileSetWriter::new(
            ShapefileWriter::new(shp, shx)?,
            DbaseWriter::new(dbf, header, self.options.encoding, self.options.overflow)?,
        );
        writer.close()?;

        match crs_wkt {
            Some(wkt) => sidecar::write_prj(&self.files, owner, wkt)?,
            None => self.files.delete(ShpFileType::Prj, owner)?,
        }
        if self.options.write_cpg {
            sidecar::write_cpg(&self.files, owner, self.options.encoding)?;
        }

        info!("Created shapefile {} with {} columns", self.files.path(ShpFileType::Shp).display(), schema.value_count());
        Ok(())
    }

    /// Stream features matching `query`
    pub fn feature_reader(&self, query: &Query) -> Result<FeatureReader> {
        FeatureReader::open(self, query)
    }

    /// All features, in file order
    pub fn features(&self) -> Result<Vec<Feature>> {
        self.feature_reader(&Query::all())?.collect()
    }

    /// Random access by identifier through the `.shx` index and DBF row arithmetic
    pub fn feature_by_id(&self, fid: &FeatureId) -> Result<Feature> {
        let not_found = || ShpError::FeatureNotFound { fid: fid.to_string() };
        let index = self.fids.row_for(fid).ok_or_else(not_found)?;
        let owner = LockOwner::new();
        let mut shapes = self.open_shapes(owner)?;

        let record = if self.options.use_index && self.files.exists(ShpFileType::Shx) {
            let mut entries = IndexReader::new(self.files.open_read(ShpFileType::Shx, owner)?)?;
            if index >= entries.count() {
                return Err(not_found());
            }
            shapes.shape_at(entries.entry(index)?.offset_bytes())?
        } else {
            debug!("Locating {} by sequential scan", fid);
            for _ in 0..index {
                if !shapes.skip_record()? {
                    return Err(not_found());
                }
            }
            shapes.next_record()?.ok_or_else(not_found)?
        };

        let attributes = match self.open_rows(owner)? {
            Some(mut rows) => {
                if index >= rows.row_count() {
                    return Err(not_found());
                }
                let row = rows.row_at(index)?;
                if row.deleted {
                    return Err(not_found());
                }
                row.values
            }
            None => Vec::new(),
        };

        Ok(Feature { fid: fid.clone(), geometry: record.geometry, attributes })
    }

    /// Rewrite the set through temporary files; the originals change only on `close`
    pub fn feature_writer(&self) -> Result<FeatureWriter> {
        FeatureWriter::open(self)
    }

    /// Append features after the existing ones, returning their identifiers
    pub fn add_features(&self, features: impl IntoIterator<Item = Feature>) -> Result<Vec<FeatureId>> {
        let mut writer = self.feature_writer()?;
        let fids = features.into_iter().map(|f| writer.append(f)).collect::<Result<Vec<_>>>()?;
        writer.close()?;
        Ok(fids)
    }

    /// Check that `.shp`, `.shx` and `.dbf` describe the same records
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        let owner = LockOwner::new();
        let mut report = ConsistencyReport::default();
        let mut shapes = self.open_shapes(owner)?;
        let shape_type = shapes.shape_type();

        let mut index = if self.files.exists(ShpFileType::Shx) {
            Some(IndexReader::new(self.files.open_read(ShpFileType::Shx, owner)?)?)
        } else {
            report.problems.push("No .shx index".to_string());
            None
        };
        report.index_entries = index.as_ref().map(|i| i.count());
        report.rows = self.open_rows(owner)?.map(|rows| rows.row_count());

        while let Some(raw) = shapes.next_raw()? {
            let position = report.shape_records;
            report.shape_records += 1;

            if let Err(e) = raw.decode(shape_type) {
                report.note(format!("Record {}: {}", raw.number, e));
            }
            if let Some(entries) = index.as_mut() {
                if position < entries.count() {
                    let entry = entries.entry(position)?;
                    if entry.offset_bytes() != raw.offset || entry.content_length != raw.content_length() {
                        report.note(format!(
                                "Index entry {} points at byte {} ({} words) but the record is at byte {} ({} words)",
                                position + 1,
                                entry.offset_bytes(),
                                entry.content_length,
                                raw.offset,
                                raw.content_length()
                        ));
                    }
                }
            }
        }

        if let Some(entries) = report.index_entries.filter(|n| *n != report.shape_records) {
            report.note(format!("{} index entries for {} shape records", entries, report.shape_records));
        }
        if let Some(rows) = report.rows.filter(|n| *n != report.shape_records) {
            report.note(format!("{} DBF rows for {} shape records", rows, report.shape_records));
        }
        Ok(report)
    }

    /// Copy the set to `target` without decoding geometries; deleted rows are dropped
    pub fn copy_to(&self, target: impl AsRef<Path>) -> Result<ShapefileDataStore> {
        let destination = ShapefileDataStore::open(target, self.options)?.with_crs_registry(self.registry.clone());
        if destination.files.base() == self.files.base() {
            return Err(ShpError::InvalidPath {
                path: destination.files.base().to_path_buf(),
                reason: "Copy target is the source shapefile".to_string(),
            });
        }
        let source_owner = LockOwner::new();
        let target_owner = LockOwner::new();

        let mut shapes = self.open_shapes(source_owner)?;
        let mut rows = self.open_rows(source_owner)?;
        let encoding = self.encoding(source_owner)?;
        let header = rows.as_ref().map_or_else(|| DbaseHeader::new(Vec::new()), |r| r.header().clone());

        let files = destination.files();
        let mut writer = ShapefileSetWriter::new(
            ShapefileWriter::new(
                files.open_write(ShpFileType::Shp, target_owner)?,
                files.open_write(ShpFileType::Shx, target_owner)?,
            )?
            .with_shape_type(shapes.shape_type()),
            DbaseWriter::new(files.open_write(ShpFileType::Dbf, target_owner)?, header, encoding, self.options.overflow)?,
        );

        let mut dropped = 0;
        while shapes.has_next() {
            let row = match rows.as_mut() {
                Some(rows) => rows.read_raw_row()?.ok_or(ShpError::RecordCountMismatch {
                    shapes: writer.record_count() + dropped + 1,
                    rows: rows.row_count() as u32,
                })?,
                None => vec![ROW_ACTIVE],
            };
            if row[0] == ROW_DELETED {
                shapes.skip_record()?;
                dropped += 1;
                continue;
            }
            writer.transfer_from(&mut shapes, &row)?;
        }
        if let Some(rows) = rows.as_ref().filter(|r| r.has_next()) {
            return Err(ShpError::RecordCountMismatch {
                shapes: writer.record_count() + dropped,
                rows: rows.row_count() as u32,
            });
        }
        writer.close()?;

        if let Some(wkt) = sidecar::read_prj(&self.files, source_owner)? {
            sidecar::write_prj(files, target_owner, &wkt)?;
        }
        if self.options.write_cpg || self.files.exists(ShpFileType::Cpg) {
            sidecar::write_cpg(files, target_owner, encoding)?;
        }
        if let Some(xml) = self.files.read_text(ShpFileType::ShpXml, source_owner)? {
            sidecar::write_text(files, ShpFileType::ShpXml, target_owner, &xml)?;
        }

        info!(
            "Copied {} records to {} ({} deleted rows dropped)",
            writer.record_count(),
            files.path(ShpFileType::Shp).display(),
            dropped
        );
        Ok(destination)
    }
}
