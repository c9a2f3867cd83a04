use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Local, NaiveDate};
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::warn;

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{AttributeDescriptor, AttributeKind, Schema};

use super::format::{field_for, kind_for};
use super::{
    DbaseField, FieldType, FIELD_DESCRIPTOR_LENGTH, FILE_HEADER_LENGTH, HEADER_TERMINATOR, MAX_FIELD_NAME, VERSION,
};

/// Name given to the geometry column of schemas read from disk
pub const GEOMETRY_NAME: &str = "the_geom";

/// The DBF file header and its field descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct DbaseHeader {
    pub version: u8,
    pub last_update: NaiveDate,
    pub record_count: u32,
    pub fields: Vec<DbaseField>,
}

impl DbaseHeader {
    pub fn new(fields: Vec<DbaseField>) -> Self {
        Self { version: VERSION, last_update: Local::now().date_naive(), record_count: 0, fields }
    }

    /// Header for the value columns of a schema; geometry columns are skipped.
    ///
    /// Names longer than 10 bytes are cut, and cut names that collide get a numeric suffix.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let mut used = HashSet::new();
        let mut fields = Vec::new();

        for descriptor in schema.value_attributes() {
            let Some(mut field) = field_for(descriptor) else {
                continue;
            };
            if !field.name.is_ascii() || field.name.is_empty() {
                return Err(ShpError::UnsupportedAttribute {
                    name: field.name,
                    kind: "column name that is empty or not ASCII".to_string(),
                });
            }

            let mut name: String = field.name.chars().take(MAX_FIELD_NAME).collect();
            let mut counter = 1;
            while !used.insert(name.to_ascii_uppercase()) {
                let suffix = counter.to_string();
                let stem: String = field.name.chars().take(MAX_FIELD_NAME - suffix.len()).collect();
                name = format!("{}{}", stem, suffix);
                counter += 1;
            }
            if name != field.name {
                warn!("Column {} stored as {}", field.name, name);
            }
            field.name = name;
            fields.push(field);
        }

        Ok(Self::new(fields))
    }

    /// Schema with a leading geometry column followed by one attribute per field
    pub fn to_schema(&self, type_name: &str) -> Schema {
        let geometry = AttributeDescriptor::new(GEOMETRY_NAME, AttributeKind::Geometry);
        self.fields.iter().fold(Schema::new(type_name).attribute(geometry), |schema, field| {
            let mut descriptor = AttributeDescriptor::new(&field.name, kind_for(field)).with_length(field.length);
            if field.decimals > 0 {
                descriptor = descriptor.with_decimals(field.decimals);
            }
            schema.attribute(descriptor)
        })
    }

    /// Header length in bytes, terminator included
    pub fn header_length(&self) -> usize {
        FILE_HEADER_LENGTH + FIELD_DESCRIPTOR_LENGTH * self.fields.len() + 1
    }

    /// Row length in bytes, deletion flag included
    pub fn record_length(&self) -> usize {
        1 + self.fields.iter().map(|f| f.length).sum::<usize>()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Parse a header, leaving `source` positioned at the first row
    pub fn read<R: Read>(source: &mut R) -> Result<Self> {
        let mut fixed = [0u8; FILE_HEADER_LENGTH];
        source.read_exact(&mut fixed).map_err(|e| truncated(e, "the 32-byte header"))?;
        let mut cursor = &fixed[..];

        let version = cursor.read_u8()?;
        let (year, month, day) = (cursor.read_u8()?, cursor.read_u8()?, cursor.read_u8()?);
        let record_count = cursor.read_u32::<LittleEndian>()?;
        let header_length = cursor.read_u16::<LittleEndian>()? as usize;
        let record_length = cursor.read_u16::<LittleEndian>()? as usize;

        let last_update = NaiveDate::from_ymd_opt(1900 + year as i32, month as u32, day as u32)
            .unwrap_or(NaiveDate::MIN);

        if header_length < FILE_HEADER_LENGTH + 1 {
            return Err(ShpError::format("dbf", format!("Header length {} is too small", header_length)));
        }

        let mut fields = Vec::new();
        let mut consumed = FILE_HEADER_LENGTH;
        while consumed + FIELD_DESCRIPTOR_LENGTH <= header_length {
            let mut descriptor = [0u8; FIELD_DESCRIPTOR_LENGTH];
            source.read_exact(&mut descriptor[..1]).map_err(|e| truncated(e, "the field descriptors"))?;
            consumed += 1;
            if descriptor[0] == HEADER_TERMINATOR {
                break;
            }
            source.read_exact(&mut descriptor[1..]).map_err(|e| truncated(e, "the field descriptors"))?;
            consumed += FIELD_DESCRIPTOR_LENGTH - 1;
            fields.push(parse_descriptor(&descriptor)?);
        }

        // skip the terminator and any padding up to the declared header length
        if consumed < header_length {
            let mut rest = vec![0u8; header_length - consumed];
            source.read_exact(&mut rest).map_err(|e| truncated(e, "the header padding"))?;
        }

        let header = Self { version, last_update, record_count, fields };
        if header.record_length() != record_length {
            return Err(ShpError::format(
                "dbf",
                format!(
                    "Declared record length {} does not match the field widths ({})",
                    record_length,
                    header.record_length()
                ),
            ));
        }
        Ok(header)
    }

    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        let header_length = u16::try_from(self.header_length())
            .map_err(|_| ShpError::format("dbf", format!("{} fields do not fit a DBF header", self.fields.len())))?;
        let record_length = u16::try_from(self.record_length())
            .map_err(|_| ShpError::format("dbf", format!("Row length {} exceeds 65535 bytes", self.record_length())))?;

        sink.write_u8(self.version)?;
        sink.write_u8((self.last_update.year() - 1900).clamp(0, 255) as u8)?;
        sink.write_u8(self.last_update.month() as u8)?;
        sink.write_u8(self.last_update.day() as u8)?;
        sink.write_u32::<LittleEndian>(self.record_count)?;
        sink.write_u16::<LittleEndian>(header_length)?;
        sink.write_u16::<LittleEndian>(record_length)?;
        sink.write_all(&[0u8; 20])?;

        for field in &self.fields {
            let mut name = [0u8; 11];
            let bytes = field.name.as_bytes();
            let n = bytes.len().min(MAX_FIELD_NAME);
            name[..n].copy_from_slice(&bytes[..n]);
            sink.write_all(&name)?;
            sink.write_u8(field.field_type.code())?;
            sink.write_all(&[0u8; 4])?;
            sink.write_u8(field.length as u8)?;
            sink.write_u8(field.decimals as u8)?;
            sink.write_all(&[0u8; 14])?;
        }
        sink.write_u8(HEADER_TERMINATOR)?;
        Ok(())
    }
}

fn truncated(error: std::io::Error, what: &str) -> ShpError {
    match error.kind() {
        std::io::ErrorKind::UnexpectedEof => ShpError::format("dbf", format!("File ends inside {}", what)),
        _ => ShpError::Io(error),
    }
}

fn parse_descriptor(descriptor: &[u8; FIELD_DESCRIPTOR_LENGTH]) -> Result<DbaseField> {
    let name_end = descriptor[..11].iter().position(|b| *b == 0).unwrap_or(11);
    let name = String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string();

    let field_type = FieldType::from_code(descriptor[11]).ok_or_else(|| {
        ShpError::format("dbf", format!("Field {} has unsupported type '{}'", name, descriptor[11] as char))
    })?;
    let length = descriptor[16] as usize;
    let decimals = descriptor[17] as usize;
    if length == 0 {
        return Err(ShpError::format("dbf", format!("Field {} has zero width", name)));
    }

    Ok(DbaseField { name, field_type, length, decimals })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new("roads")
            .attribute(AttributeDescriptor::new("the_geom", AttributeKind::Geometry))
            .attribute(AttributeDescriptor::new("id", AttributeKind::Integer))
            .attribute(AttributeDescriptor::new("name", AttributeKind::Text).with_length(20))
    }

    #[test]
    fn test_layout() {
        let mut header = DbaseHeader::from_schema(&schema()).unwrap();
        header.record_count = 7;
        header.last_update = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        assert_eq!(buf.len(), 32 + 2 * 32 + 1);
        assert_eq!(&buf[0..4], &[0x03, 124, 5, 17]);
        assert_eq!(&buf[4..8], &[7, 0, 0, 0]);
        assert_eq!(&buf[8..10], &[97, 0]);
        assert_eq!(&buf[10..12], &[31, 0]);
        assert_eq!(&buf[32..35], b"id\0");
        assert_eq!(buf[43], b'N');
        assert_eq!(buf[48], 10);
        assert_eq!(buf[96], HEADER_TERMINATOR);

        let parsed = DbaseHeader::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_long_names_are_deduplicated() {
        let schema = Schema::new("t")
            .attribute(AttributeDescriptor::new("population_2020", AttributeKind::Long))
            .attribute(AttributeDescriptor::new("population_2021", AttributeKind::Long));
        let header = DbaseHeader::from_schema(&schema).unwrap();
        assert_eq!(header.fields[0].name, "population");
        assert_eq!(header.fields[1].name, "populatio1");
    }

    #[test]
    fn test_to_schema() {
        let header = DbaseHeader::from_schema(&schema()).unwrap();
        let schema = header.to_schema("roads");
        assert_eq!(schema.geometry_attribute().unwrap().name, GEOMETRY_NAME);
        assert_eq!(schema.value_index("NAME"), Some(1));
        assert_eq!(schema.value_attributes().nth(1).unwrap().length, Some(20));
    }

    #[test]
    fn test_record_length_mismatch() {
        let mut buf = Vec::new();
        DbaseHeader::from_schema(&schema()).unwrap().write(&mut buf).unwrap();
        buf[10] = 40;
        assert!(DbaseHeader::read(&mut &buf[..]).unwrap_err().is_format_error());
    }
}
