use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{Envelope, ShapeType};

use super::{FILE_CODE, HEADER_LENGTH, VERSION};

/// The 100-byte header of a `.shp` or `.shx` file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapefileHeader {
    /// Total file length in 16-bit words, header included
    pub file_length: u32,
    pub shape_type: ShapeType,
    pub bounds: Envelope,
}

impl ShapefileHeader {
    /// Header of a file holding no records
    pub fn empty(shape_type: ShapeType) -> Self {
        Self { file_length: (HEADER_LENGTH / 2) as u32, shape_type, bounds: Envelope::null() }
    }

    pub fn file_length_bytes(&self) -> u64 {
        self.file_length as u64 * 2
    }

    /// Parse a header; `file` names the member in error messages
    pub fn read<R: Read>(source: &mut R, file: &str) -> Result<Self> {
        let mut buf = [0u8; HEADER_LENGTH as usize];
        source.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                ShpError::format(file, "File is shorter than the 100-byte header")
            }
            _ => ShpError::Io(e),
        })?;
        let mut cursor = &buf[..];

        let file_code = cursor.read_i32::<BigEndian>()?;
        if file_code != FILE_CODE {
            return Err(ShpError::format(file, format!("Bad file code {} (expected {})", file_code, FILE_CODE)));
        }

        let mut unused = [0u8; 20];
        cursor.read_exact(&mut unused)?;
        let file_length = cursor.read_i32::<BigEndian>()?;
        if file_length < (HEADER_LENGTH / 2) as i32 {
            return Err(ShpError::format(file, format!("Declared file length {} words is too small", file_length)));
        }

        let version = cursor.read_i32::<LittleEndian>()?;
        if version != VERSION {
            tracing::warn!("Unexpected .{} version {} (expected {})", file, version, VERSION);
        }

        let shape_type = ShapeType::from_id(cursor.read_i32::<LittleEndian>()?)?;

        let mut ordinates = [0f64; 8];
        for ordinate in ordinates.iter_mut() {
            *ordinate = cursor.read_f64::<LittleEndian>()?;
        }
        let [min_x, min_y, max_x, max_y, min_z, max_z, min_m, max_m] = ordinates;

        Ok(Self {
            file_length: file_length as u32,
            shape_type,
            bounds: Envelope { min_x, min_y, max_x, max_y, min_z, max_z, min_m, max_m },
        })
    }

    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_i32::<BigEndian>(FILE_CODE)?;
        sink.write_all(&[0u8; 20])?;
        sink.write_i32::<BigEndian>(self.file_length as i32)?;
        sink.write_i32::<LittleEndian>(VERSION)?;
        sink.write_i32::<LittleEndian>(self.shape_type.id())?;

        let xy = self.bounds.xy_or_zero();
        let z = self.bounds.z_or_zero();
        let m = self.bounds.m_or_zero();
        for ordinate in xy.iter().chain(z.iter()).chain(m.iter()) {
            sink.write_f64::<LittleEndian>(*ordinate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = ShapefileHeader {
            file_length: 64,
            shape_type: ShapeType::Polygon,
            bounds: Envelope::new(-1.0, -2.0, 3.0, 4.0),
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        assert_eq!(buf.len(), 100);
        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x27, 0x0a]);
        assert_eq!(&buf[24..28], &[0, 0, 0, 64]);
        assert_eq!(&buf[28..32], &[0xe8, 0x03, 0, 0]);
        assert_eq!(&buf[32..36], &[5, 0, 0, 0]);

        let parsed = ShapefileHeader::read(&mut &buf[..], "shp").unwrap();
        assert_eq!(parsed.file_length, 64);
        assert_eq!(parsed.shape_type, ShapeType::Polygon);
        assert_eq!(parsed.bounds.xy_or_zero(), [-1.0, -2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_header_has_zero_bounds() {
        let mut buf = Vec::new();
        ShapefileHeader::empty(ShapeType::Null).write(&mut buf).unwrap();
        assert!(buf[36..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_bad_file_code() {
        let mut buf = vec![0u8; 100];
        buf[3] = 1;
        let err = ShapefileHeader::read(&mut &buf[..], "shx").unwrap_err();
        assert!(err.to_string().contains(".shx"));
    }

    #[test]
    fn test_truncated_header() {
        let buf = vec![0u8; 40];
        assert!(ShapefileHeader::read(&mut &buf[..], "shp").unwrap_err().is_format_error());
    }
}
