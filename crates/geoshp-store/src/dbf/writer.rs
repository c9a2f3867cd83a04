use byteorder::WriteBytesExt;
use chrono::Local;
use encoding_rs::Encoding;
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

use geoshp_core::config::OverflowPolicy;
use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::AttributeValue;

use super::format::{format_value, DbaseWarning};
use super::header::DbaseHeader;
use super::{END_OF_FILE, ROW_ACTIVE};

/// A formatted row that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub bytes: Vec<u8>,
    pub warnings: Vec<DbaseWarning>,
}

/// Appends DBF rows; the record count is patched into the header on `close`
#[derive(Debug)]
pub struct DbaseWriter<W> {
    sink: W,
    header: DbaseHeader,
    encoding: &'static Encoding,
    policy: OverflowPolicy,
    warnings: Vec<DbaseWarning>,
    closed: bool,
}

impl<W: Write + Seek> DbaseWriter<W> {
    pub fn new(
        mut sink: W,
        mut header: DbaseHeader,
        encoding: &'static Encoding,
        policy: OverflowPolicy,
    ) -> Result<Self> {
        header.record_count = 0;
        sink.seek(SeekFrom::Start(0))?;
        header.write(&mut sink)?;
        Ok(Self { sink, header, encoding, policy, warnings: Vec::new(), closed: false })
    }

    pub fn header(&self) -> &DbaseHeader {
        &self.header
    }

    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    /// Values shortened to fit their fields so far
    pub fn warnings(&self) -> &[DbaseWarning] {
        &self.warnings
    }

    /// Format a row without writing it
    pub fn encode_row(&self, values: &[AttributeValue]) -> Result<EncodedRow> {
        if values.len() != self.header.fields.len() {
            return Err(ShpError::format(
                "dbf",
                format!("Row has {} values for {} fields", values.len(), self.header.fields.len()),
            ));
        }

        let mut bytes = Vec::with_capacity(self.header.record_length());
        let mut warnings = Vec::new();
        bytes.push(ROW_ACTIVE);
        for (field, value) in self.header.fields.iter().zip(values) {
            let (cell, warning) = format_value(field, value, self.encoding, self.policy)?;
            bytes.extend_from_slice(&cell);
            warnings.extend(warning);
        }
        Ok(EncodedRow { bytes, warnings })
    }

    pub fn write_encoded(&mut self, row: EncodedRow) -> Result<()> {
        self.write_raw_row(&row.bytes)?;
        self.warnings.extend(row.warnings);
        Ok(())
    }

    pub fn write_row(&mut self, values: &[AttributeValue]) -> Result<()> {
        let row = self.encode_row(values)?;
        self.write_encoded(row)
    }

    /// Append a row exactly as stored, deletion flag included
    pub fn write_raw_row(&mut self, raw: &[u8]) -> Result<()> {
        if self.closed {
            return Err(ShpError::WriterClosed);
        }
        if raw.len() != self.header.record_length() {
            return Err(ShpError::format(
                "dbf",
                format!("Row of {} bytes for a record length of {}", raw.len(), self.header.record_length()),
            ));
        }
        self.sink.write_all(raw)?;
        self.header.record_count += 1;
        Ok(())
    }

    /// Write the end-of-file marker, then the final header
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ShpError::WriterClosed);
        }
        self.sink.write_u8(END_OF_FILE)?;
        self.sink.flush()?;

        self.header.last_update = Local::now().date_naive();
        self.sink.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.sink)?;
        self.sink.seek(SeekFrom::End(0))?;
        self.sink.flush()?;

        debug!("Closed DBF with {} rows", self.header.record_count);
        self.closed = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
