//! Error types and response classification.
//!
//! # Design
//! Every failed or malformed response collapses into one shape,
//! [`AdapterError`], carrying the server message and the HTTP status. The
//! finer taxonomy (rejection, shape mismatch, auth expiry, rate limiting) is
//! derived from the status via [`AdapterError::kind`] rather than stored, so
//! the error stays trivially constructible from any endpoint.
//!
//! Network failures never produce a response and are kept apart in
//! [`TransportError`]. [`DataError`] is the union the data adapter returns.

use serde_json::Value;
use thiserror::Error;

use crate::http::HttpResponse;

/// Fallback message when the server gave no usable explanation.
pub const GENERIC_FAILURE: &str = "Request failed.";

/// Number of body characters kept in a non-JSON diagnostic.
const SNIPPET_CHARS: usize = 100;

/// A failed or unusable HTTP response, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (HTTP {status_code})")]
pub struct AdapterError {
    pub message: String,
    pub status_code: u16,
}

/// Classification of an [`AdapterError`] by its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-2xx response the backend chose to send.
    BackendRejection,
    /// 2xx response whose content type or structure is not the expected envelope.
    ShapeMismatch,
    /// 401: the session is gone.
    AuthExpiry,
    /// 429: recoverable, never a logout trigger.
    RateLimited,
}

impl AdapterError {
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status_code {
            200..=299 => ErrorKind::ShapeMismatch,
            401 => ErrorKind::AuthExpiry,
            429 => ErrorKind::RateLimited,
            _ => ErrorKind::BackendRejection,
        }
    }
}

/// The backend could not be reached or the exchange broke mid-flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// Errors returned by data adapter operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The outgoing payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl DataError {
    /// HTTP status behind the error, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DataError::Adapter(err) => Some(err.status_code),
            _ => None,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid backend url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Turn a failed (or unusable) response into an [`AdapterError`].
///
/// JSON bodies contribute their `message` or `error` field; anything else
/// yields a truncated diagnostic. Never panics on malformed input.
pub fn classify(response: &HttpResponse) -> AdapterError {
    let message = if response.is_json() {
        backend_message(response).unwrap_or_else(|| GENERIC_FAILURE.to_string())
    } else {
        non_json_diagnostic(&response.body)
    };
    tracing::warn!(status = response.status, %message, "request failed");
    AdapterError::new(message, response.status)
}

/// The `message` (or `error`) string of a JSON error body, if there is one.
pub(crate) fn backend_message(response: &HttpResponse) -> Option<String> {
    let value: Value = serde_json::from_str(&response.body).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

fn non_json_diagnostic(body: &str) -> String {
    let snippet: String = body.trim().chars().take(SNIPPET_CHARS).collect();
    if snippet.is_empty() {
        "Unexpected non-JSON response from server.".to_string()
    } else {
        format!("Unexpected non-JSON response from server: {snippet}")
    }
}
