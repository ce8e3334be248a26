//! Platform API error types

use thiserror::Error;

/// Errors raised by the Official Account API client.
///
/// No variant is retried at this layer; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token fetch rejected by the platform. Fatal to any in-flight
    /// operation depending on the token.
    #[error("Auth error {code}: {message}")]
    Auth { code: i64, message: String },

    /// Caller-supplied parameters violate a precondition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Platform-level business rejection, surfaced verbatim.
    #[error("Platform error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Network or timeout failure below the platform protocol.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success-shaped response body lacked a promised field.
    #[error("Malformed platform response: missing field '{0}'")]
    MissingField(&'static str),

    /// The platform reported a publish status code this client does not know.
    #[error("Unknown publish status code: {0}")]
    UnknownStatusCode(u8),
}
