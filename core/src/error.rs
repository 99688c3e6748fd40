//! Error types for the Autoskope client.
//!
//! # Design
//! Callers see two failure kinds: `InvalidAuth` when the backend rejects the
//! credentials or the session, and `CannotConnect` for everything that stops
//! us from getting usable data (transport failures, unexpected statuses,
//! malformed bodies). Transport errors are re-wrapped at the session boundary
//! so no HTTP library type reaches the caller.

use thiserror::Error;

/// Errors returned by `AutoskopeApi` and the response interpreters.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected or session no longer authorized.
    #[error("authentication failed: {0}")]
    InvalidAuth(String),

    /// Transport failure, unexpected status, or malformed response body.
    #[error("cannot connect: {0}")]
    CannotConnect(String),

    /// A request was issued before `connect`.
    #[error("not connected; call connect() first")]
    NotConnected,
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::InvalidAuth(_))
    }
}

/// Errors raised while building a `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("host must be a valid HTTP(S) URL, got: {0}")]
    InvalidHost(String),

    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid timeout value: {0}")]
    InvalidTimeout(String),
}

/// Low-level transport failures. Never returned from the public session API.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not open")]
    NotOpen,

    #[error(transparent)]
    Http(#[from] ureq::Error),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotOpen => ApiError::NotConnected,
            other => ApiError::CannotConnect(format!("error connecting to Autoskope API: {other}")),
        }
    }
}
