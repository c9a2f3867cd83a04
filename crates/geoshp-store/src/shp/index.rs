//! Reading and writing the `.shx` record index.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Envelope, ShapeType};

use super::header::ShapefileHeader;
use super::{HEADER_LENGTH, INDEX_ENTRY_LENGTH};

/// Location of one record in the `.shp` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset of the record header, in 16-bit words
    pub offset: u32,
    /// Content length, in 16-bit words, record header excluded
    pub content_length: u32,
}

impl IndexEntry {
    pub fn offset_bytes(&self) -> u64 {
        self.offset as u64 * 2
    }
}

/// Random access over `.shx` entries
#[derive(Debug)]
pub struct IndexReader<R> {
    source: R,
    header: ShapefileHeader,
    count: usize,
}

impl<R: Read + Seek> IndexReader<R> {
    pub fn new(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let header = ShapefileHeader::read(&mut source, "shx")?;
        let physical = source.seek(SeekFrom::End(0))?;
        let declared = header.file_length_bytes().min(physical);
        let count = (declared.saturating_sub(HEADER_LENGTH) / INDEX_ENTRY_LENGTH) as usize;
        Ok(Self { source, header, count })
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    /// Number of records the index describes
    pub fn count(&self) -> usize {
        self.count
    }

    /// Entry for the zero-based record `index`
    pub fn entry(&mut self, index: usize) -> Result<IndexEntry> {
        if index >= self.count {
            return Err(ShpError::format(
                "shx",
                format!("Record {} is past the end of the index ({} entries)", index, self.count),
            ));
        }
        self.source.seek(SeekFrom::Start(HEADER_LENGTH + index as u64 * INDEX_ENTRY_LENGTH))?;
        let offset = self.source.read_i32::<BigEndian>()?;
        let content_length = self.source.read_i32::<BigEndian>()?;
        if offset < (HEADER_LENGTH / 2) as i32 || content_length < 0 {
            return Err(ShpError::format(
                "shx",
                format!("Entry {} has invalid offset {} or length {}", index, offset, content_length),
            ));
        }
        Ok(IndexEntry { offset: offset as u32, content_length: content_length as u32 })
    }
}

/// Appends `.shx` entries behind a provisional header
#[derive(Debug)]
pub struct IndexWriter<W> {
    sink: W,
    count: u32,
}

impl<W: Write + Seek> IndexWriter<W> {
    /// Start an index; a zeroed header is written until `finish`
    pub fn new(mut sink: W) -> Result<Self> {
        sink.seek(SeekFrom::Start(0))?;
        ShapefileHeader::empty(ShapeType::Null).write(&mut sink)?;
        Ok(Self { sink, count: 0 })
    }

    pub fn append_entry(&mut self, entry: IndexEntry) -> Result<()> {
        self.sink.write_i32::<BigEndian>(entry.offset as i32)?;
        self.sink.write_i32::<BigEndian>(entry.content_length as i32)?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Overwrite the provisional header now that the totals are known
    pub fn finish(&mut self, shape_type: ShapeType, bounds: Envelope) -> Result<()> {
        let file_length = (HEADER_LENGTH + self.count as u64 * INDEX_ENTRY_LENGTH) / 2;
        let header = ShapefileHeader { file_length: file_length as u32, shape_type, bounds };
        self.sink.seek(SeekFrom::Start(0))?;
        header.write(&mut self.sink)?;
        self.sink.seek(SeekFrom::End(0))?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_then_lookup() {
        let mut writer = IndexWriter::new(Cursor::new(Vec::new())).unwrap();
        writer.append_entry(IndexEntry { offset: 50, content_length: 10 }).unwrap();
        writer.append_entry(IndexEntry { offset: 64, content_length: 10 }).unwrap();
        writer.finish(ShapeType::Point, Envelope::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        let bytes = writer.into_inner().into_inner();

        assert_eq!(bytes.len(), 116);
        assert_eq!(&bytes[100..108], &[0, 0, 0, 50, 0, 0, 0, 10]);

        let mut reader = IndexReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.count(), 2);
        assert_eq!(reader.header().file_length, 58);
        assert_eq!(reader.entry(1).unwrap(), IndexEntry { offset: 64, content_length: 10 });
        assert_eq!(reader.entry(1).unwrap().offset_bytes(), 128);
        assert!(reader.entry(2).is_err());
    }
}
