//! Operation-level error type.

use client::ClientError;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by an operation handler for one item.
///
/// The engine does not distinguish between variants: every one of them is a
/// per-item failure, recoverable when continue-on-failure is on.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A required parameter was not supplied for this item.
    #[error("parameter '{0}' is required")]
    MissingParameter(String),

    /// A parameter has the wrong shape.
    #[error("parameter '{name}' is invalid: {message}")]
    InvalidParameter { name: String, message: String },

    /// A JSON text parameter does not parse.
    #[error("{label} is not valid JSON: {message}")]
    InvalidJson { label: String, message: String },

    /// The operation's own consistency checks failed (e.g. mutually exclusive fields).
    #[error("{0}")]
    Validation(String),

    /// The execution context has no API client configured.
    #[error("no Feishu Project credentials configured")]
    MissingClient,

    /// The HTTP helper or the API rejected the request.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The item's task ended without producing an outcome.
    #[error("operation task aborted: {0}")]
    Aborted(String),
}

impl OperationError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Troubleshooting hint attached to API errors.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Client(err) => err.description(),
            _ => None,
        }
    }

    /// Structured body of the underlying API failure, when there is one.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Client(err) => err.details(),
            _ => None,
        }
    }
}
