//! Typed error type for the client crate.

use serde_json::Value;
use thiserror::Error;

/// Error codes that mean the cached plugin token is no longer usable.
///
/// - `10022`: plugin token expired.
/// - `10211`: token info is invalid.
pub const TOKEN_REFRESH_ERROR_CODES: [i64; 2] = [10022, 10211];

/// Troubleshooting guide for Feishu Project API error codes.
pub const ERROR_HELP_URL: &str = "https://project.feishu.cn/b/helpcenter/1p8d7djs/5aueo3jr";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered with a non-zero `err_code`.
    #[error("{message}")]
    Api {
        code: i64,
        message: String,
        /// Human-readable hint (API detail message or the help URL).
        description: String,
        /// Raw error body, when the failure came back as an HTTP error.
        details: Option<Value>,
    },

    /// The plugin token exchange did not return a token.
    #[error("authorization failed: {code}, {message}")]
    Auth { code: String, message: String },

    /// Non-2xx response whose body is not an API envelope.
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
}

impl ClientError {
    /// Build an API error for an envelope carried by a successful HTTP response.
    pub(crate) fn envelope(code: i64, err_msg: &str) -> Self {
        Self::Api {
            code,
            message: format!("Feishu Project API error: {code}, {err_msg}"),
            description: format!("see troubleshooting guide: {ERROR_HELP_URL}"),
            details: None,
        }
    }

    /// Build an API error for an envelope carried by an HTTP error response.
    pub(crate) fn http_envelope(code: i64, err_msg: &str, body: Value) -> Self {
        let detail_msg = body
            .pointer("/err/msg")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty());
        let description = match detail_msg {
            Some(msg) => match body.pointer("/err/log_id").and_then(Value::as_str) {
                Some(log_id) if !log_id.is_empty() => format!("{msg} (log_id: {log_id})"),
                _ => msg.to_owned(),
            },
            None => format!("error code: {code}, see troubleshooting guide: {ERROR_HELP_URL}"),
        };

        Self::Api {
            code,
            message: format!("Feishu Project API error: {code}, {err_msg}"),
            description,
            details: Some(body),
        }
    }

    /// API error code, if this is an API error.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the cached token should be dropped and the call retried.
    pub fn is_token_expired(&self) -> bool {
        self.code()
            .map(|c| TOKEN_REFRESH_ERROR_CODES.contains(&c))
            .unwrap_or(false)
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Api { description, .. } => Some(description),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}
