//! Application State Management
//!
//! Everything a request needs is built once at startup and shared
//! read-only across workers: the URL signer, the storage service and the
//! configuration it came from.

use log::info;
use std::sync::Arc;

use crate::auth::signature::{SignerError, UrlSigner};
use crate::config::AppConfig;
use crate::service::StorageService;
use crate::storage::{local_store::LocalFileStore, mock_store::MockObjectStore, Storage};

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub signer: Arc<UrlSigner>,
    pub storage_service: Arc<StorageService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state backed by the configured upload directory
    pub fn from_config(config: AppConfig) -> Result<Self, SignerError> {
        info!("Initializing application state with configuration");
        let storage: Arc<dyn Storage> = Arc::new(LocalFileStore::new(&config.storage.upload_dir));
        Self::with_storage(config, storage)
    }

    /// Create application state around an explicit storage backend
    pub fn with_storage(config: AppConfig, storage: Arc<dyn Storage>) -> Result<Self, SignerError> {
        let signer = Arc::new(UrlSigner::new(&config.auth.secret_key)?);
        let storage_service = Arc::new(StorageService::new(storage, config.server.max_payload_size));
        Ok(Self {
            signer,
            storage_service,
            config,
        })
    }

    /// Create application state for testing with an in-memory backend
    pub fn new_for_testing(secret: &str) -> Result<Self, SignerError> {
        let mut config = AppConfig::default();
        config.auth.secret_key = secret.to_string();
        Self::with_storage(config, Arc::new(MockObjectStore::new()))
    }
}
