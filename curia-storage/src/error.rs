use curia_core::ResolverError;
use thiserror::Error;

/// Errors surfaced by a `Storage` implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("entity not found")]
    NotFound,

    #[error("storage operation failed: {reason}")]
    Failed { reason: String },
}

impl From<StorageError> for ResolverError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ResolverError::NotFound("entity not found".to_string()),
            StorageError::Failed { reason } => ResolverError::Engine(reason),
        }
    }
}
