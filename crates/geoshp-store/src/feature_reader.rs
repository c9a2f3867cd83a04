//! Lockstep iteration over shape records and DBF rows.

use tracing::debug;

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Envelope, Feature, FidMapper, Query, Schema, ShapefileFidMapper};

use crate::datastore::ShapefileDataStore;
use crate::dbf::{DbaseReader, ROW_DELETED};
use crate::files::LockedFile;
use crate::lock::LockOwner;
use crate::shp::{codec, ShapefileReader};

/// Iterator over the features matching a query.
///
/// Each item pairs one shape record with the DBF row at the same position.
/// Rows flagged as deleted are skipped together with their shape. When the
/// query asks for no attribute columns the DBF is never opened, so deleted
/// rows cannot be detected.
#[derive(Debug)]
pub struct FeatureReader {
    shapes: ShapefileReader<LockedFile>,
    rows: Option<DbaseReader<LockedFile>>,
    schema: Schema,
    /// DBF column index for each attribute in `schema`
    selection: Vec<usize>,
    fids: ShapefileFidMapper,
    bbox: Option<Envelope>,
    to_skip: usize,
    remaining: Option<usize>,
    position: usize,
    done: bool,
}

impl FeatureReader {
    pub(crate) fn open(store: &ShapefileDataStore, query: &Query) -> Result<Self> {
        let owner = LockOwner::new();
        let full = store.schema()?;
        let geometry = full.geometry_attribute().cloned();

        let selection: Vec<usize> = match &query.properties {
            None => (0..full.value_count()).collect(),
            Some(names) => names
                .iter()
                .filter(|name| geometry.as_ref().map_or(true, |g| !g.name.eq_ignore_ascii_case(name.as_str())))
                .map(|name| {
                    full.value_index(name).ok_or_else(|| ShpError::UnsupportedAttribute {
                        name: name.clone(),
                        kind: format!("unknown column of {}", full.type_name),
                    })
                })
                .collect::<Result<_>>()?,
        };

        let mut schema = Schema::new(full.type_name.clone());
        if let Some(geometry) = geometry {
            schema = schema.attribute(geometry);
        }
        let values: Vec<_> = full.value_attributes().collect();
        for i in &selection {
            schema = schema.attribute(values[*i].clone());
        }

        let rows = if query.needs_attributes() && !selection.is_empty() {
            store.open_rows(owner)?
        } else {
            debug!("Reading {} without its attribute table", store.type_name());
            None
        };

        Ok(Self {
            shapes: store.open_shapes(owner)?,
            rows,
            schema,
            selection,
            fids: store.fid_mapper().clone(),
            bbox: query.bbox,
            to_skip: query.start_index,
            remaining: query.max_features,
            position: 0,
            done: false,
        })
    }

    /// Geometry column followed by the selected attribute columns
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn advance(&mut self) -> Result<Option<Feature>> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }

            let Some(raw) = self.shapes.next_raw()? else {
                if let Some(rows) = self.rows.as_ref().filter(|r| r.has_next()) {
                    return Err(ShpError::RecordCountMismatch {
                        shapes: self.position as u32,
                        rows: rows.row_count() as u32,
                    });
                }
                return Ok(None);
            };
            let index = self.position;
            self.position += 1;

            let row = match self.rows.as_mut() {
                Some(rows) => match rows.read_raw_row()? {
                    Some(row) => Some(row),
                    None => {
                        return Err(ShpError::RecordCountMismatch {
                            shapes: self.position as u32,
                            rows: rows.row_count() as u32,
                        })
                    }
                },
                None => None,
            };

            if row.as_ref().is_some_and(|r| r[0] == ROW_DELETED) {
                continue;
            }
            if let Some(bbox) = &self.bbox {
                if !codec::record_envelope(&raw.content)?.intersects(bbox) {
                    continue;
                }
            }
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }

            let record = raw.decode(self.shapes.shape_type())?;
            let attributes = match (&self.rows, row) {
                (Some(rows), Some(row)) => {
                    let decoded = rows.decode(index, &row).values;
                    self.selection.iter().map(|i| decoded[*i].clone()).collect()
                }
                _ => Vec::new(),
            };

            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some(Feature { fid: self.fids.fid_for(index), geometry: record.geometry, attributes }));
        }
    }
}

impl Iterator for FeatureReader {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
