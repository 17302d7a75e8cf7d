//! Error hierarchy: narrow leaf enums per collaborator, aggregated into one
//! top-level error for callers.

use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// The top-level error type returned by every public resolver operation.
/// Each variant corresponds to one distinctly-surfaced error kind.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    /// Missing required argument to an operation (e.g. `completeTask`
    /// without `id`/`taskId`/`form`/`outcome`).
    #[error("user input error: {0}")]
    UserInput(String),

    /// Entity (or task) missing on `get`/`completeTask`.
    #[error("not found: {0}")]
    NotFound(String),

    /// Access, read-restriction, write, destroy, task, or owner-scope
    /// failure. Write failures carry the offending field list.
    #[error("authorization error: {message}")]
    Authorization {
        message: String,
        fields: Vec<String>,
    },

    /// Form/outcome missing, outcome not `Complete`, or model not marked
    /// `input`.
    #[error("logic error: {0}")]
    Logic(String),

    /// Any BPM call failure, uniformly opaque to the caller.
    #[error("business engine error")]
    Engine(String),
}

impl ResolverError {
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn authorization_fields(message: impl Into<String>, fields: Vec<String>) -> Self {
        Self::Authorization {
            message: message.into(),
            fields,
        }
    }
}

impl From<ConfigError> for ResolverError {
    fn from(err: ConfigError) -> Self {
        ResolverError::Logic(err.to_string())
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;
