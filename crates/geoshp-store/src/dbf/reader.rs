use encoding_rs::Encoding;
use std::io::{Read, Seek, SeekFrom};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::AttributeValue;

use super::format::parse_value;
use super::header::DbaseHeader;
use super::{END_OF_FILE, ROW_DELETED};

/// One decoded DBF row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Zero-based row position
    pub index: usize,
    pub deleted: bool,
    pub values: Vec<AttributeValue>,
}

/// Sequential and random-access reads of DBF rows
#[derive(Debug)]
pub struct DbaseReader<R> {
    source: R,
    header: DbaseHeader,
    encoding: &'static Encoding,
    data_start: u64,
    next_row: usize,
}

impl<R: Read + Seek> DbaseReader<R> {
    pub fn new(mut source: R, encoding: &'static Encoding) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = DbaseHeader::read(&mut source)?;
        let data_start = header.header_length() as u64;
        Ok(Self { source, header, encoding, data_start, next_row: 0 })
    }

    pub fn header(&self) -> &DbaseHeader {
        &self.header
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn row_count(&self) -> usize {
        self.header.record_count as usize
    }

    pub fn has_next(&self) -> bool {
        self.next_row < self.row_count()
    }

    fn read_raw_at(&mut self, index: usize) -> Result<Vec<u8>> {
        let length = self.header.record_length();
        self.source.seek(SeekFrom::Start(self.data_start + (index * length) as u64))?;

        let mut raw = vec![0u8; length];
        self.source.read_exact(&mut raw).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ShpError::format(
                "dbf",
                format!("File ends at row {} of {} declared rows", index, self.row_count()),
            ),
            _ => ShpError::Io(e),
        })?;
        if raw[0] == END_OF_FILE {
            return Err(ShpError::format(
                "dbf",
                format!("End-of-file marker at row {} of {} declared rows", index, self.row_count()),
            ));
        }
        Ok(raw)
    }

    /// Next row's bytes, deletion flag included
    pub fn read_raw_row(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.has_next() {
            return Ok(None);
        }
        let raw = self.read_raw_at(self.next_row)?;
        self.next_row += 1;
        Ok(Some(raw))
    }

    pub fn read_row(&mut self) -> Result<Option<Row>> {
        let index = self.next_row;
        Ok(self.read_raw_row()?.map(|raw| self.decode(index, &raw)))
    }

    /// Random access by zero-based row index
    pub fn row_at(&mut self, index: usize) -> Result<Row> {
        if index >= self.row_count() {
            return Err(ShpError::format(
                "dbf",
                format!("Row {} requested from a table of {} rows", index, self.row_count()),
            ));
        }
        let raw = self.read_raw_at(index)?;
        Ok(self.decode(index, &raw))
    }

    /// Decode raw row bytes as returned by `read_raw_row`
    pub fn decode(&self, index: usize, raw: &[u8]) -> Row {
        let mut offset = 1;
        let values = self
            .header
            .fields
            .iter()
            .map(|field| {
                let cell = &raw[offset..offset + field.length];
                offset += field.length;
                parse_value(field, cell, self.encoding)
            })
            .collect();
        Row { index, deleted: raw[0] == ROW_DELETED, values }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
