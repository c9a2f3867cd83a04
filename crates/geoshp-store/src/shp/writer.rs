//! Sequential `.shp`/`.shx` writing with deferred header finalisation.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Envelope, Geometry, ShapeType};

use super::codec;
use super::header::ShapefileHeader;
use super::index::{IndexEntry, IndexWriter};
use super::{HEADER_LENGTH, RECORD_HEADER_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Finalizing,
    Closed,
}

/// Writes shape records and their index entries.
///
/// Headers are written zeroed on creation and overwritten by `close`, once the
/// shape type, bounds and file length are known. The shape type binds to the
/// first non-null geometry unless set up front with `with_shape_type`.
#[derive(Debug)]
pub struct ShapefileWriter<W: Write + Seek> {
    shp: W,
    index: IndexWriter<W>,
    shape_type: Option<ShapeType>,
    bounds: Envelope,
    /// Offset of the next record, in 16-bit words
    offset: u32,
    records: u32,
    state: WriterState,
}

impl<W: Write + Seek> ShapefileWriter<W> {
    pub fn new(mut shp: W, shx: W) -> Result<Self> {
        shp.seek(SeekFrom::Start(0))?;
        ShapefileHeader::empty(ShapeType::Null).write(&mut shp)?;
        Ok(Self {
            shp,
            index: IndexWriter::new(shx)?,
            shape_type: None,
            bounds: Envelope::null(),
            offset: (HEADER_LENGTH / 2) as u32,
            records: 0,
            state: WriterState::Open,
        })
    }

    /// Commit the file's shape type before any record is written
    pub fn with_shape_type(mut self, shape_type: ShapeType) -> Self {
        if !shape_type.is_null() {
            self.shape_type = Some(shape_type);
        }
        self
    }

    pub fn shape_type(&self) -> Option<ShapeType> {
        self.shape_type
    }

    pub fn bounds(&self) -> &Envelope {
        &self.bounds
    }

    pub fn record_count(&self) -> u32 {
        self.records
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            _ => Err(ShpError::WriterClosed),
        }
    }

    /// Encode and append one geometry, returning its record number.
    ///
    /// A rejected geometry leaves the stream unchanged.
    pub fn write_geometry(&mut self, geometry: &Geometry) -> Result<u32> {
        self.ensure_open()?;
        let number = self.records + 1;

        let shape_type = match self.shape_type {
            Some(bound) => bound,
            None if geometry.is_empty() => ShapeType::Null,
            None => geometry.shape_type(),
        };
        let content = codec::encode(geometry, shape_type).map_err(|e| match e {
            ShpError::InvalidGeometry { reason, .. } => ShpError::InvalidGeometry { record: number, reason },
            other => other,
        })?;

        if self.shape_type.is_none() && !shape_type.is_null() {
            debug!("Shape type bound to {} by record {}", shape_type, number);
            self.shape_type = Some(shape_type);
        }
        let envelope = codec::record_envelope(&content)?;
        self.append(&content, envelope)
    }

    /// Append already-encoded record content, as produced by `codec::encode`
    pub fn write_raw_record(&mut self, content: &[u8]) -> Result<u32> {
        self.ensure_open()?;
        let found = codec::record_shape_type(content)?;
        if !found.is_null() {
            match self.shape_type {
                Some(bound) if bound != found => {
                    return Err(ShpError::ShapeTypeMismatch { expected: bound, found });
                }
                Some(_) => {}
                None => self.shape_type = Some(found),
            }
        }
        if content.len() % 2 != 0 {
            return Err(ShpError::format("shp", "Record content has an odd byte length"));
        }
        let envelope = codec::record_envelope(content)?;
        self.append(content, envelope)
    }

    fn append(&mut self, content: &[u8], envelope: Envelope) -> Result<u32> {
        let number = self.records + 1;
        let words = (content.len() / 2) as u32;

        self.shp.write_i32::<BigEndian>(number as i32)?;
        self.shp.write_i32::<BigEndian>(words as i32)?;
        self.shp.write_all(content)?;
        self.index.append_entry(IndexEntry { offset: self.offset, content_length: words })?;

        self.offset += (RECORD_HEADER_LENGTH / 2) as u32 + words;
        self.records = number;
        if !envelope.is_null() {
            self.bounds.merge(&envelope);
        }
        Ok(number)
    }

    /// Flush every record, then overwrite both provisional headers.
    ///
    /// A file with no records gets a NULL shape type and a zero bounding box.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = WriterState::Finalizing;

        self.shp.flush()?;
        let shape_type = self.shape_type.unwrap_or_default();
        let header = ShapefileHeader { file_length: self.offset, shape_type, bounds: self.bounds };
        self.shp.seek(SeekFrom::Start(0))?;
        header.write(&mut self.shp)?;
        self.shp.seek(SeekFrom::End(0))?;
        self.shp.flush()?;
        self.index.finish(shape_type, self.bounds)?;

        debug!("Closed shapefile with {} records of type {}", self.records, shape_type);
        self.state = WriterState::Closed;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    /// The `.shp` and `.shx` sinks
    pub fn into_inner(self) -> (W, W) {
        (self.shp, self.index.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoshp_core::models::Coord;
    use std::io::Cursor;

    fn writer() -> ShapefileWriter<Cursor<Vec<u8>>> {
        ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap()
    }

    #[test]
    fn test_empty_file() {
        let mut w = writer();
        w.close().unwrap();
        let (shp, shx) = w.into_inner();
        let (shp, shx) = (shp.into_inner(), shx.into_inner());

        assert_eq!(shp.len(), 100);
        assert_eq!(shx.len(), 100);
        let header = ShapefileHeader::read(&mut &shp[..], "shp").unwrap();
        assert_eq!(header.shape_type, ShapeType::Null);
        assert_eq!(header.file_length, 50);
        assert_eq!(header.bounds.xy_or_zero(), [0.0; 4]);
    }

    #[test]
    fn test_point_then_polygon_rejected() {
        let mut w = writer();
        w.write_geometry(&Geometry::point(1.0, 1.0)).unwrap();
        let err = w.write_geometry(&Geometry::polygon(vec![vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]));
        assert!(matches!(err, Err(ShpError::ShapeTypeMismatch { .. })));
        assert_eq!(w.record_count(), 1);
    }

    #[test]
    fn test_polygon_then_polygon_z_rejected_unless_upgraded() {
        let square = |z: Option<f64>| Geometry::Polygon {
            coordinates: vec![[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]
                .iter()
                .map(|p| Coord { x: p[0], y: p[1], z, m: None })
                .collect()],
        };

        let mut w = writer();
        w.write_geometry(&square(None)).unwrap();
        assert!(matches!(w.write_geometry(&square(Some(3.0))), Err(ShpError::ShapeTypeMismatch { .. })));

        let mut upgraded = writer().with_shape_type(ShapeType::PolygonZ);
        upgraded.write_geometry(&square(None)).unwrap();
        upgraded.write_geometry(&square(Some(3.0))).unwrap();
        upgraded.close().unwrap();
        assert_eq!(upgraded.bounds().z_or_zero(), [0.0, 3.0]);
    }

    #[test]
    fn test_null_records_do_not_bind_type() {
        let mut w = writer();
        w.write_geometry(&Geometry::Null).unwrap();
        assert_eq!(w.shape_type(), None);
        w.write_geometry(&Geometry::multi_point(vec![[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(w.shape_type(), Some(ShapeType::MultiPoint));
        assert_eq!(w.record_count(), 2);
    }

    #[test]
    fn test_invalid_geometry_leaves_stream_untouched() {
        let mut w = writer();
        w.write_geometry(&Geometry::point(0.0, 0.0)).unwrap();
        let err = w.write_geometry(&Geometry::point(f64::NAN, 0.0)).unwrap_err();
        assert!(matches!(err, ShpError::InvalidGeometry { record: 2, .. }));
        w.write_geometry(&Geometry::point(2.0, 2.0)).unwrap();
        w.close().unwrap();

        let (shp, _) = w.into_inner();
        assert_eq!(shp.into_inner().len(), 100 + 2 * 28);
    }

    #[test]
    fn test_write_after_close() {
        let mut w = writer();
        w.close().unwrap();
        assert!(w.is_closed());
        assert!(matches!(w.write_geometry(&Geometry::point(0.0, 0.0)), Err(ShpError::WriterClosed)));
        assert!(matches!(w.close(), Err(ShpError::WriterClosed)));
    }
}
