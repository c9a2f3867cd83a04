//! Error types for GeoShp

use std::path::PathBuf;
use thiserror::Error;

use crate::models::ShapeType;

#[derive(Debug, Error)]
pub enum ShpError {
    // Format errors
    #[error("Invalid .{file} file: {message}")]
    Format { file: String, message: String },

    #[error("Record {record} declares {declared} content bytes but {actual} were decoded")]
    ContentLengthMismatch {
        record: u32,
        declared: usize,
        actual: usize,
    },

    #[error("Shape type mismatch: file holds {expected}, got {found}")]
    ShapeTypeMismatch { expected: ShapeType, found: ShapeType },

    #[error("Invalid geometry for record {record}: {reason}")]
    InvalidGeometry { record: u32, reason: String },

    // Attribute errors
    #[error("Value '{value}' does not fit field {field} (width {width})")]
    FieldOverflow {
        field: String,
        value: String,
        width: usize,
    },

    #[error("Attribute {name} of kind {kind} cannot be stored in a DBF file")]
    UnsupportedAttribute { name: String, kind: String },

    #[error("Lockstep violation: {shapes} shape records but {rows} attribute rows")]
    RecordCountMismatch { shapes: u32, rows: u32 },

    // File-set errors
    #[error("Lock on {path} is not held by owner {owner}: {reason}")]
    LockOwnership {
        path: PathBuf,
        owner: String,
        reason: String,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Feature not found: {fid}")]
    FeatureNotFound { fid: String },

    #[error("Writer already closed")]
    WriterClosed,

    #[error("No current feature; call next() first")]
    NoCurrentFeature,

    #[error("Cannot encode text as {charset}: {reason}")]
    Encoding { charset: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShpError {
    /// Build a format error for the given file extension
    pub fn format(file: &str, message: impl Into<String>) -> Self {
        ShpError::Format { file: file.to_string(), message: message.into() }
    }

    /// Whether this error reports corrupt or inconsistent file content
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ShpError::Format { .. }
                | ShpError::ContentLengthMismatch { .. }
                | ShpError::ShapeTypeMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ShpError>;
