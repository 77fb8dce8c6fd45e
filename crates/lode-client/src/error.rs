//! Error taxonomy for catalog operations.
//!
//! Four failure families, kept distinct because callers react differently
//! to each: operational failures (the server said no), invalid responses
//! (the server said yes but the body is not what the protocol promises),
//! invalid requests (caller misuse, rejected before any network call), and
//! configuration errors. "Aspect not found" is not an error at all; the
//! affected operations return `Option`.

use crate::rest::RestError;
use lode_types::UrnError;
use serde_json::Value;
use thiserror::Error;

/// Error type for all catalog client operations.
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    /// The server rejected the request. Carries the server's error payload
    /// when it was parseable JSON, otherwise a synthesized message object.
    #[error("catalog request failed: {message}")]
    RequestFailed { message: String, info: Value },

    /// The server accepted the request but the response violates the
    /// protocol (missing envelope field, GraphQL errors, more values than
    /// the contract allows). Usually a schema or version mismatch.
    #[error("invalid response from catalog: {0}")]
    InvalidResponse(String),

    /// Caller misuse, rejected without a network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be constructed from its configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A urn received from the caller or the server is malformed.
    #[error(transparent)]
    Urn(#[from] UrnError),
}

/// Result type for catalog client operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<RestError> for CatalogError {
    fn from(error: RestError) -> Self {
        match error {
            RestError::Status { status, info } => CatalogError::RequestFailed {
                message: format!("server returned status {status}"),
                info,
            },
            RestError::Transport(message) => CatalogError::RequestFailed {
                message,
                info: Value::Null,
            },
            RestError::Decode(message) => CatalogError::InvalidResponse(message),
        }
    }
}
