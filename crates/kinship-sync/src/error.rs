//! Error types for Kinship Sync

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync error types
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Core error: {0}")]
    Core(#[from] kinship_core::Error),

    #[error("Store error: {0}")]
    Store(#[from] kinship_store::StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Sync service stopped")]
    ServiceStopped,

    #[error("Sync worker failed: {0}")]
    Worker(String),
}

/// Processor registry construction errors
///
/// These are fatal at startup: a registry that fails to build is never used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate processor: {0}")]
    DuplicateProcessor(String),

    #[error("Invalid processor name or setting key: '{0}'")]
    InvalidName(String),

    #[error("Unknown processor setting: {0}")]
    UnknownSetting(String),
}
