//! Error types for Kinship Core

use thiserror::Error;

/// Result type alias using Kinship's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Kinship core error types
///
/// Problems inside documents are never errors; they surface as
/// [`crate::Warning`]s.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
