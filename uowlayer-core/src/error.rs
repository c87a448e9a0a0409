//! Error types and result types for unit-of-work operations.
//!
//! Every fallible operation in the workspace returns [`UnitOfWorkResult<T>`].
//! Backends map their driver errors onto [`UnitOfWorkError`] while keeping the
//! kind of failure intact, so callers can match on it without knowing which
//! backend produced it.

use bson::error::Error as BsonError;
use config::ConfigError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by the unit-of-work layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitOfWorkError {
    /// Missing or invalid configuration: an empty resolved collection name,
    /// a missing database name, a malformed host list. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// An argument was rejected before reaching the store (e.g. a page size of zero).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The deployment does not support the requested capability, typically
    /// multi-document transactions on a standalone server.
    #[error("Not supported: {0}")]
    NotSupported(String),
    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    /// A backend that cannot recover the ID reports its own message instead.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl UnitOfWorkError {
    /// Returns `true` when the store signalled that the capability is unavailable.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, UnitOfWorkError::NotSupported(_))
    }

    /// Returns `true` when the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UnitOfWorkError::Cancelled)
    }
}

/// A specialized `Result` type for unit-of-work operations.
pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;

impl From<BsonError> for UnitOfWorkError {
    fn from(err: BsonError) -> Self {
        UnitOfWorkError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for UnitOfWorkError {
    fn from(err: SerdeJsonError) -> Self {
        UnitOfWorkError::Serialization(err.to_string())
    }
}

impl From<ConfigError> for UnitOfWorkError {
    fn from(err: ConfigError) -> Self {
        UnitOfWorkError::Configuration(err.to_string())
    }
}
