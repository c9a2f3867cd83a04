//! The `.shp` main file and its `.shx` index.

pub mod codec;
pub mod header;
pub mod index;
pub mod reader;
pub mod writer;

pub use header::ShapefileHeader;
pub use index::{IndexEntry, IndexReader, IndexWriter};
pub use reader::{RawRecord, ShapeRecord, ShapefileReader};
pub use writer::ShapefileWriter;

/// Size of the fixed header shared by `.shp` and `.shx`
pub const HEADER_LENGTH: u64 = 100;

/// Size of the big-endian record header preceding every shape
pub const RECORD_HEADER_LENGTH: u64 = 8;

/// Size of one `.shx` entry
pub const INDEX_ENTRY_LENGTH: u64 = 8;

pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;

/// Measures below this value mean "no data"
pub const NO_DATA_THRESHOLD: f64 = -1.0e38;

/// Value written for a missing measure
pub const NO_DATA: f64 = -1.0e39;
