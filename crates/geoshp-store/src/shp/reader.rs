//! Streaming and random-access reads of `.shp` records.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Envelope, Geometry, ShapeType};

use super::codec;
use super::header::ShapefileHeader;
use super::writer::ShapefileWriter;
use super::{HEADER_LENGTH, RECORD_HEADER_LENGTH};

/// A record's bytes as stored, before decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub number: u32,
    /// Byte offset of the record header in the `.shp` file
    pub offset: u64,
    /// Content bytes following the 8-byte record header
    pub content: Vec<u8>,
}

impl RawRecord {
    /// Content length in 16-bit words, as declared in the record header
    pub fn content_length(&self) -> u32 {
        (self.content.len() / 2) as u32
    }

    /// Decode the content; the payload must fill the declared length exactly
    pub fn decode(&self, expected: ShapeType) -> Result<ShapeRecord> {
        let (shape_type, geometry, consumed) = codec::decode_counted(&self.content, expected)?;
        if consumed != self.content.len() {
            return Err(ShpError::ContentLengthMismatch {
                record: self.number,
                declared: self.content.len(),
                actual: consumed,
            });
        }
        let envelope = geometry.envelope();
        Ok(ShapeRecord {
            number: self.number,
            offset: self.offset,
            content_length: self.content_length(),
            shape_type,
            geometry,
            envelope,
        })
    }
}

/// A decoded shape record
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub number: u32,
    pub offset: u64,
    pub content_length: u32,
    pub shape_type: ShapeType,
    pub geometry: Geometry,
    pub envelope: Envelope,
}

/// Reads records from a `.shp` source.
///
/// The reader keeps its own sequential position; `shape_at` seeks anywhere
/// without disturbing it.
#[derive(Debug)]
pub struct ShapefileReader<R> {
    source: R,
    header: ShapefileHeader,
    position: u64,
    end: u64,
    next_number: u32,
}

impl<R: Read + Seek> ShapefileReader<R> {
    /// Read the header and check it against the first non-null record
    pub fn new(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = ShapefileHeader::read(&mut source, "shp")?;

        let physical = source.seek(SeekFrom::End(0))?;
        let declared = header.file_length_bytes();
        if declared != physical {
            warn!("Header declares {} bytes but .shp holds {}; reading up to the shorter", declared, physical);
        }

        let mut reader =
            Self { source, header, position: HEADER_LENGTH, end: declared.min(physical), next_number: 1 };
        reader.check_first_record()?;
        Ok(reader)
    }

    fn check_first_record(&mut self) -> Result<()> {
        let mut offset = HEADER_LENGTH;
        while offset + RECORD_HEADER_LENGTH < self.end {
            let raw = self.read_raw_at(offset)?;
            let found = codec::record_shape_type(&raw.content)?;
            if !found.is_null() {
                if found.family() != self.header.shape_type.family() {
                    return Err(ShpError::ShapeTypeMismatch { expected: self.header.shape_type, found });
                }
                break;
            }
            offset += RECORD_HEADER_LENGTH + raw.content.len() as u64;
        }
        Ok(())
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// True while a record header fits before the end declared by the file header
    pub fn has_next(&self) -> bool {
        self.position + RECORD_HEADER_LENGTH <= self.end
    }

    fn read_raw_at(&mut self, offset: u64) -> Result<RawRecord> {
        if offset + RECORD_HEADER_LENGTH > self.end {
            return Err(ShpError::format("shp", format!("No record at byte offset {}", offset)));
        }
        self.source.seek(SeekFrom::Start(offset))?;
        let number = self.source.read_i32::<BigEndian>()?;
        let words = self.source.read_i32::<BigEndian>()?;
        if words < 0 {
            return Err(ShpError::format("shp", format!("Record {} has negative content length {}", number, words)));
        }

        let length = words as u64 * 2;
        if offset + RECORD_HEADER_LENGTH + length > self.end {
            return Err(ShpError::format(
                "shp",
                format!("Record {} at byte {} runs past the end of the file", number, offset),
            ));
        }

        let mut content = vec![0u8; length as usize];
        self.source.read_exact(&mut content)?;
        Ok(RawRecord { number: number as u32, offset, content })
    }

    /// Next record's bytes, without decoding
    pub fn next_raw(&mut self) -> Result<Option<RawRecord>> {
        if !self.has_next() {
            return Ok(None);
        }
        let raw = self.read_raw_at(self.position)?;
        if raw.number != self.next_number {
            warn!("Record {} found where record {} was expected", raw.number, self.next_number);
        }
        self.position += RECORD_HEADER_LENGTH + raw.content.len() as u64;
        self.next_number += 1;
        Ok(Some(raw))
    }

    /// Decode the next record and advance
    pub fn next_record(&mut self) -> Result<Option<ShapeRecord>> {
        match self.next_raw()? {
            Some(raw) => raw.decode(self.header.shape_type).map(Some),
            None => Ok(None),
        }
    }

    /// Skip the next record without decoding it; false at end of file
    pub fn skip_record(&mut self) -> Result<bool> {
        Ok(self.next_raw()?.is_some())
    }

    /// Decode the record whose header starts at `offset` bytes
    pub fn shape_at(&mut self, offset: u64) -> Result<ShapeRecord> {
        if offset < HEADER_LENGTH {
            return Err(ShpError::format("shp", format!("Offset {} falls inside the file header", offset)));
        }
        self.read_raw_at(offset)?.decode(self.header.shape_type)
    }

    /// Copy the next record into `writer` without decoding its geometry.
    ///
    /// Returns the number the record received in the writer, or `None` at end of file.
    pub fn transfer_to<W: Write + Seek>(&mut self, writer: &mut ShapefileWriter<W>) -> Result<Option<u32>> {
        match self.next_raw()? {
            Some(raw) => {
                let number = writer.write_raw_record(&raw.content)?;
                debug!("Transferred record {} as record {}", raw.number, number);
                Ok(Some(number))
            }
            None => Ok(None),
        }
    }

    /// Rewind to the first record
    pub fn rewind(&mut self) {
        self.position = HEADER_LENGTH;
        self.next_number = 1;
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read + Seek> Iterator for ShapefileReader<R> {
    type Item = Result<ShapeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn write_points(points: &[[f64; 2]]) -> Vec<u8> {
        let mut writer = ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
        for p in points {
            writer.write_geometry(&Geometry::point(p[0], p[1])).unwrap();
        }
        writer.close().unwrap();
        writer.into_inner().0.into_inner()
    }

    #[test]
    fn test_sequential_read() {
        let bytes = write_points(&[[0.0, 0.0], [5.0, 5.0]]);
        let reader = ShapefileReader::new(Cursor::new(bytes)).unwrap();
        let records: Vec<ShapeRecord> = reader.collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].number, 2);
        assert_eq!(records[1].offset, 128);
        assert_eq!(records[1].geometry, Geometry::point(5.0, 5.0));
    }

    #[test]
    fn test_shape_at_does_not_move_cursor() {
        let bytes = write_points(&[[0.0, 0.0], [5.0, 5.0], [9.0, 1.0]]);
        let mut reader = ShapefileReader::new(Cursor::new(bytes)).unwrap();

        let third = reader.shape_at(156).unwrap();
        assert_eq!(third.geometry, Geometry::point(9.0, 1.0));
        assert_eq!(reader.next_record().unwrap().unwrap().number, 1);
        assert!(reader.shape_at(40).is_err());
    }

    #[test]
    fn test_content_length_mismatch() {
        let mut bytes = write_points(&[[1.0, 2.0]]);
        // declare 12 words instead of 10 and pad the file to match
        bytes[107] = 12;
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes[27] = 66;

        let mut reader = ShapefileReader::new(Cursor::new(bytes)).unwrap();
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, ShpError::ContentLengthMismatch { record: 1, declared: 24, actual: 20 }));
    }

    #[test]
    fn test_header_family_disagrees_with_records() {
        let mut bytes = write_points(&[[1.0, 2.0]]);
        bytes[32] = 5;
        let err = ShapefileReader::new(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ShpError::ShapeTypeMismatch { .. }));
    }

    #[test]
    fn test_record_past_end_is_format_error() {
        let mut bytes = write_points(&[[1.0, 2.0]]);
        bytes.truncate(120);
        let err = ShapefileReader::new(Cursor::new(bytes)).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_null_records_are_skipped_when_checking_header() {
        let mut writer = ShapefileWriter::new(Cursor::new(Vec::new()), Cursor::new(Vec::new())).unwrap();
        writer.write_geometry(&Geometry::Null).unwrap();
        writer.write_geometry(&Geometry::line_string(vec![[0.0, 0.0], [1.0, 1.0]])).unwrap();
        writer.close().unwrap();
        let bytes = writer.into_inner().0.into_inner();

        let mut reader = ShapefileReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.shape_type(), ShapeType::Polyline);
        assert_eq!(reader.next_record().unwrap().unwrap().geometry, Geometry::Null);

        let mut content = Vec::new();
        content.write_i32::<byteorder::LittleEndian>(0).unwrap();
        assert!(codec::record_shape_type(&content).unwrap().is_null());
    }
}
