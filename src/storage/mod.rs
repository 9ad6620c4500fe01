//! Object Storage Layer Abstraction
//!
//! Stored objects are flat, opaque byte blobs addressed only by their name.
//! Backends implement [`Storage`]; handlers never touch paths directly.

pub mod local_store;
pub mod mock_store;

use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object name: {0:?}")]
    InvalidName(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("failed to {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn io(op: &'static str, source: io::Error) -> Self {
        StorageError::Io { op, source }
    }
}

/// An open object ready to be streamed out.
pub struct ObjectReader {
    pub reader: Box<dyn Read + Send>,
    pub size: u64,
}

/// Receives the bytes of a new object version.
///
/// Nothing is visible under the target name until [`StagedWrite::commit`]
/// succeeds. Dropping an uncommitted write discards it.
pub trait StagedWrite: Write + Send {
    fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Trait defining the object storage interface
pub trait Storage: Send + Sync {
    /// Whether an object with this name currently exists
    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Open an object for reading
    fn open(&self, name: &str) -> Result<ObjectReader, StorageError>;

    /// Start writing a new version of an object, creating the storage root if needed
    fn stage(&self, name: &str) -> Result<Box<dyn StagedWrite>, StorageError>;

    /// Remove an object. A missing object is an error.
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Reject names that could escape the storage root or collide with staging
/// files: empty, `.`/`..`, path separators, control characters, and a
/// leading dot.
pub fn validate_object_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
