//! Theme error types

use thiserror::Error;

/// Theme-specific errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Theme file not found
    #[error("Theme not found: {0}")]
    NotFound(String),

    /// Theme declares a style for an element kind the renderer does not know
    #[error("Unknown element kind in theme: {0}")]
    UnknownElement(String),

    /// Theme file failed to parse
    #[error("Invalid theme: {0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
