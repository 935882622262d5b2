//! Marketplace API client error types.

use std::sync::Arc;

use crate::signature::SigningError;

/// What went wrong during an upstream call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamErrorKind {
    /// The request could not be signed.
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    /// The request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Non-2xx HTTP response.
    #[error("HTTP error: {status}")]
    Status { status: u16 },

    /// The body was not JSON or did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for UpstreamErrorKind {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { UpstreamErrorKind::Timeout } else { UpstreamErrorKind::Network(Arc::new(err)) }
    }
}

/// A failed upstream call, tagged with the operation that made it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed: {kind}")]
pub struct UpstreamError {
    pub operation: &'static str,
    #[source]
    pub kind: UpstreamErrorKind,
}

impl UpstreamError {
    pub fn new(operation: &'static str, kind: impl Into<UpstreamErrorKind>) -> Self {
        Self { operation, kind: kind.into() }
    }

    /// HTTP status, if the server answered with a non-2xx one.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            UpstreamErrorKind::Status { status } => Some(status),
            _ => None,
        }
    }
}
