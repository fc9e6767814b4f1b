//! Error types for zkv
//!
//! Provides a unified error type for all operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::compression::CompressorId;

/// Result type alias using ZkvError
pub type Result<T> = std::result::Result<T, ZkvError>;

/// Unified error type for zkv operations
#[derive(Debug, Error)]
pub enum ZkvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("IO error while {context}: {source}")]
    IoContext {
        context: String,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // Format Errors (fatal on open)
    // -------------------------------------------------------------------------
    #[error("Bad file format: {0}")]
    BadFormat(String),

    #[error("Unknown compressor id: {0}")]
    UnknownCompressor(CompressorId),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Unknown record action: {0}")]
    UnknownAction(i8),

    #[error("Corrupt block: {0}")]
    CorruptBlock(String),

    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Storage is read only")]
    ReadOnly,

    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Path already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),
}

impl ZkvError {
    /// Damaged data found in a record, block or the index
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ZkvError::CorruptRecord(_)
                | ZkvError::UnknownAction(_)
                | ZkvError::CorruptBlock(_)
                | ZkvError::IndexCorruption(_)
        )
    }

    /// The file is not a zkv file this build can open
    pub fn is_format_error(&self) -> bool {
        matches!(self, ZkvError::BadFormat(_) | ZkvError::UnknownCompressor(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ZkvError::NotFound)
    }
}

impl From<bincode::Error> for ZkvError {
    fn from(err: bincode::Error) -> Self {
        ZkvError::Serialization(err.to_string())
    }
}

/// Attach a description of the failed operation to an `io::Error`
pub trait IoResultExt<T> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoResultExt<T> for std::result::Result<T, io::Error> {
    fn io_context<F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| ZkvError::IoContext {
            context: context(),
            source,
        })
    }
}
