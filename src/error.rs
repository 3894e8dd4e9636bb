//! Crate-wide error taxonomy.
//!
//! Three layers, from innermost to outermost:
//!
//! - [`ProtocolError`] — the response-side contract was violated (status or
//!   body written twice). Never recoverable; the connection dies.
//! - [`HttpError`] — a well-defined HTTP failure carrying a status code and
//!   an optional plain-text message. Caught only at the [`crate::router::Router`]
//!   boundary.
//! - [`ServerError`] — the boundary type used by `config`/`app`/`main`, where
//!   a failure can no longer be represented as an in-flight HTTP response
//!   (a config file that won't parse, a port that won't bind).

use std::path::PathBuf;
use thiserror::Error;

/// The response object's monotonic state machine was violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("protocol error: {0}")]
pub struct ProtocolError(pub String);

impl ProtocolError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A well-defined HTTP failure. Carries the status code to send and an
/// optional plain-text body; [`crate::router::Router::dispatch`] converts
/// one of these into a response by walking the configured error-page chain
/// before falling back to the default status+body handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("HTTP error {code}: {}", message.as_deref().unwrap_or(""))]
pub struct HttpError {
    pub code: u16,
    pub message: Option<String>,
}

impl HttpError {
    pub fn new(code: u16) -> Self {
        Self { code, message: None }
    }

    pub fn with_message(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: Some(message.into()) }
    }
}

/// Transport-level failures: broken pipe, reset, timeout, partial read.
/// Logged to stderr and the connection is dropped; never surfaced as an
/// HTTP response because there is no guarantee the peer can still read one.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] pub std::io::Error);

/// Failures while loading or validating the JSON configuration record.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },

    #[error("server entry {index} is missing a required field: {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("two server entries both bind port {port}")]
    DuplicatePort { port: u16 },
}

/// The boundary error type used by `main`/`app`: anything that prevents the
/// server from starting or a listener from staying up.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {host}:{port}: {source}")]
    Bind { host: String, port: u16, #[source] source: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
