//! Shared error type across relay crates.

use thiserror::Error;

/// Client-facing error codes (stable API), sent in `{type:"error", code}`
/// frames and mapped to HTTP statuses on the thin ops surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Classroom code failed validation (unknown or expired).
    InvalidClassroom,
    /// Session row is missing or `isActive=false`.
    SessionExpired,
    /// Upstream MT/TTS/STT provider unavailable after retries.
    ProviderUnavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InvalidClassroom => "INVALID_CLASSROOM",
            ClientCode::SessionExpired => "SESSION_EXPIRED",
            ClientCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid classroom code")]
    InvalidClassroom,
    #[error("session expired")]
    SessionExpired,
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RelayError::BadRequest(_) => ClientCode::BadRequest,
            RelayError::InvalidClassroom => ClientCode::InvalidClassroom,
            RelayError::SessionExpired => ClientCode::SessionExpired,
            RelayError::ProviderUnavailable(_) => ClientCode::ProviderUnavailable,
            RelayError::Store(_) | RelayError::Internal(_) => ClientCode::Internal,
        }
    }
}
