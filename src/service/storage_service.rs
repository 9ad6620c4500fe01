//! Storage service layer between the HTTP handlers and the storage backend

use crate::error::ApiError;
use crate::storage::{ObjectReader, StagedWrite, Storage, StorageError};
use log::{error, info, warn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Object operations with errors already mapped to the HTTP taxonomy.
pub struct StorageService {
    storage: Arc<dyn Storage>,
    max_upload_size: u64,
}

impl StorageService {
    /// Create a new storage service with injected storage backend
    pub fn new(storage: Arc<dyn Storage>, max_upload_size: u64) -> Self {
        Self {
            storage,
            max_upload_size,
        }
    }

    /// Fresh stored name for an upload: a random UUID plus the original
    /// file's extension, if it has one. The extension is everything after the
    /// last `.` of the final path component, so `.bashrc` keeps `bashrc`.
    pub fn generate_name(original_filename: &str) -> String {
        let id = Uuid::new_v4();
        let extension = Path::new(original_filename)
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|e| !e.is_empty() && !e.contains('\\') && !e.chars().any(char::is_control));
        match extension {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        }
    }

    /// Fails with 404 unless `name` already exists.
    pub fn ensure_exists(&self, name: &str) -> Result<(), ApiError> {
        match self.storage.exists(name) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApiError::NotFound("File Not found.")),
            Err(StorageError::InvalidName(_)) => Err(invalid_name(name)),
            Err(e) => {
                error!("Failed to check {}: {}", name, e);
                Err(ApiError::Internal("Failed to check file."))
            }
        }
    }

    /// Start writing `name`. The write becomes visible on [`Upload::finish`].
    pub fn begin_write(&self, name: &str) -> Result<Upload, ApiError> {
        let writer = self.storage.stage(name).map_err(|e| match e {
            StorageError::InvalidName(_) => invalid_name(name),
            e => {
                error!("Failed to create {}: {}", name, e);
                ApiError::Internal("Failed to create file.")
            }
        })?;
        Ok(Upload {
            name: name.to_string(),
            writer,
            written: 0,
            limit: self.max_upload_size,
        })
    }

    /// Open `name` for reading. Any failure to open is reported as 404.
    pub fn open(&self, name: &str) -> Result<ObjectReader, ApiError> {
        self.storage.open(name).map_err(|e| match e {
            StorageError::InvalidName(_) => invalid_name(name),
            StorageError::NotFound(_) => ApiError::NotFound("File not found"),
            e => {
                warn!("Failed to open {}: {}", name, e);
                ApiError::NotFound("File not found")
            }
        })
    }

    /// Remove `name`. A missing file is a plain removal failure.
    pub fn remove(&self, name: &str) -> Result<(), ApiError> {
        match self.storage.remove(name) {
            Ok(()) => {
                info!("Removed {}", name);
                Ok(())
            }
            Err(StorageError::InvalidName(_)) => Err(invalid_name(name)),
            Err(e) => {
                error!("Failed to remove {}: {}", name, e);
                Err(ApiError::Internal("Failed to remove file."))
            }
        }
    }
}

fn invalid_name(name: &str) -> ApiError {
    warn!("Rejected object name {:?}", name);
    ApiError::BadRequest("Invalid filename")
}

/// An in-progress object write with a byte budget.
pub struct Upload {
    name: String,
    writer: Box<dyn StagedWrite>,
    written: u64,
    limit: u64,
}

impl Upload {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ApiError> {
        let written = self.written + chunk.len() as u64;
        if written > self.limit {
            warn!("Upload of {} exceeded {} bytes", self.name, self.limit);
            return Err(ApiError::PayloadTooLarge { limit: self.limit });
        }
        self.writer.write_all(chunk).map_err(|e| {
            error!("Failed to write {}: {}", self.name, e);
            ApiError::Internal("Failed to save file.")
        })?;
        self.written = written;
        Ok(())
    }

    /// Publish the object and return its size in bytes.
    pub fn finish(self) -> Result<u64, ApiError> {
        let Upload { name, writer, written, .. } = self;
        writer.commit().map_err(|e| {
            error!("Failed to save {}: {}", name, e);
            ApiError::Internal("Failed to save file.")
        })?;
        info!("Stored {} ({} bytes)", name, written);
        Ok(written)
    }
}
