//! The dBASE III attribute table.

pub mod format;
pub mod header;
pub mod reader;
pub mod writer;

pub use format::DbaseWarning;
pub use header::DbaseHeader;
pub use reader::{DbaseReader, Row};
pub use writer::{DbaseWriter, EncodedRow};

use std::fmt;

/// dBASE III without memo
pub const VERSION: u8 = 0x03;

pub const FILE_HEADER_LENGTH: usize = 32;
pub const FIELD_DESCRIPTOR_LENGTH: usize = 32;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const END_OF_FILE: u8 = 0x1A;

pub const ROW_ACTIVE: u8 = b' ';
pub const ROW_DELETED: u8 = b'*';

/// Field names are at most 10 bytes, NUL padded to 11
pub const MAX_FIELD_NAME: usize = 10;

pub const MAX_INTEGER_WIDTH: usize = 10;
pub const MAX_LONG_WIDTH: usize = 19;
pub const MAX_DOUBLE_WIDTH: usize = 33;
pub const MAX_TEXT_WIDTH: usize = 254;

/// Type code of a DBF column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
}

impl FieldType {
    pub fn code(&self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Date => b'D',
            FieldType::Logical => b'L',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code.to_ascii_uppercase() {
            b'C' => Some(FieldType::Character),
            b'N' => Some(FieldType::Numeric),
            b'F' => Some(FieldType::Float),
            b'D' => Some(FieldType::Date),
            b'L' => Some(FieldType::Logical),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code() as char)
    }
}

/// One column descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbaseField {
    pub name: String,
    pub field_type: FieldType,
    pub length: usize,
    pub decimals: usize,
}

impl DbaseField {
    pub fn new(name: impl Into<String>, field_type: FieldType, length: usize, decimals: usize) -> Self {
        Self { name: name.into(), field_type, length, decimals }
    }

    /// Numeric column without a fractional part
    pub fn is_integral(&self) -> bool {
        self.field_type == FieldType::Numeric && self.decimals == 0
    }
}
