//! GeoShp Store - the shapefile engine
//!
//! Binary codecs for `.shp`, `.shx` and `.dbf`, the lock-coordinated file set,
//! and the datastore that reads and rewrites features on top of them.

pub mod datastore;
pub mod dbf;
pub mod feature_reader;
pub mod feature_writer;
pub mod files;
pub mod lock;
pub mod set_writer;
pub mod shp;
pub mod sidecar;

pub use datastore::{ConsistencyReport, ShapefileDataStore};
pub use feature_reader::FeatureReader;
pub use feature_writer::FeatureWriter;
pub use files::{LockedFile, ShpFileType, ShpFiles};
pub use lock::{LockHandle, LockMode, LockOwner, LockStatus, TryLock};
pub use set_writer::ShapefileSetWriter;
pub use sidecar::ShpXmlMetadata;
