//! Geometry and attribute writers driven in lockstep.

use std::io::{Read, Seek, Write};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{AttributeValue, Geometry};

use crate::dbf::{DbaseWarning, DbaseWriter};
use crate::shp::{ShapefileReader, ShapefileWriter};

/// Writes `.shp`, `.shx` and `.dbf` together.
///
/// `write_feature` appends a shape and its row as one step. The separate
/// `write_geometry` and `write_row` calls are available for callers that stream
/// the two halves; `close` refuses to finalise unless both sides hold the same
/// number of records.
#[derive(Debug)]
pub struct ShapefileSetWriter<W: Write + Seek> {
    shapes: ShapefileWriter<W>,
    rows: DbaseWriter<W>,
}

impl<W: Write + Seek> ShapefileSetWriter<W> {
    pub fn new(shapes: ShapefileWriter<W>, rows: DbaseWriter<W>) -> Self {
        Self { shapes, rows }
    }

    pub fn shapes(&self) -> &ShapefileWriter<W> {
        &self.shapes
    }

    pub fn rows(&self) -> &DbaseWriter<W> {
        &self.rows
    }

    pub fn record_count(&self) -> u32 {
        self.shapes.record_count()
    }

    pub fn warnings(&self) -> &[DbaseWarning] {
        self.rows.warnings()
    }

    /// Append one feature. The row is formatted before the shape is written, so
    /// a rejected value or geometry leaves both files unchanged.
    pub fn write_feature(&mut self, geometry: &Geometry, values: &[AttributeValue]) -> Result<u32> {
        let row = self.rows.encode_row(values)?;
        let number = self.shapes.write_geometry(geometry)?;
        self.rows.write_encoded(row)?;
        Ok(number)
    }

    /// Append one shape and row exactly as stored elsewhere
    pub fn write_raw(&mut self, shape: &[u8], row: &[u8]) -> Result<u32> {
        self.check_row_length(row)?;
        let number = self.shapes.write_raw_record(shape)?;
        self.rows.write_raw_row(row)?;
        Ok(number)
    }

    /// Move the next record of `shapes` across undecoded, paired with `row`
    pub fn transfer_from<R: Read + Seek>(
        &mut self,
        shapes: &mut ShapefileReader<R>,
        row: &[u8],
    ) -> Result<Option<u32>> {
        self.check_row_length(row)?;
        let Some(number) = shapes.transfer_to(&mut self.shapes)? else {
            return Ok(None);
        };
        self.rows.write_raw_row(row)?;
        Ok(Some(number))
    }

    pub fn write_geometry(&mut self, geometry: &Geometry) -> Result<u32> {
        self.shapes.write_geometry(geometry)
    }

    pub fn write_row(&mut self, values: &[AttributeValue]) -> Result<()> {
        self.rows.write_row(values)
    }

    fn check_row_length(&self, row: &[u8]) -> Result<()> {
        let expected = self.rows.header().record_length();
        if row.len() != expected {
            return Err(ShpError::format(
                "dbf",
                format!("Row of {} bytes for a record length of {}", row.len(), expected),
            ));
        }
        Ok(())
    }

    /// Finalise both headers; fails before touching them if the counts disagree
    pub fn close(&mut self) -> Result<()> {
        let (shapes, rows) = (self.shapes.record_count(), self.rows.record_count());
        if shapes != rows {
            return Err(ShpError::RecordCountMismatch { shapes, rows });
        }
        self.shapes.close()?;
        self.rows.close()
    }

    /// The `.shp`, `.shx` and `.dbf` sinks
    pub fn into_inner(self) -> (W, W, W) {
        let (shp, shx) = self.shapes.into_inner();
        (shp, shx, self.rows.into_inner())
    }
}
