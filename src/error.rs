//! # Error Types
//!
//! Custom error types for TOWL using `thiserror`.

use thiserror::Error;

use crate::dns::base32::Base32Error;

/// Main error type for TOWL
#[derive(Debug, Error)]
pub enum TowlError {
    /// Device identity cannot form a valid query name
    #[error("Identity error: {0}")]
    Identity(String),

    /// Query name or record payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload label is not valid base32
    #[error("Decode error: payload: {0}")]
    Base32(#[from] Base32Error),

    /// Serial port errors (GPS receiver)
    #[error("Serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TOWL
pub type Result<T> = std::result::Result<T, TowlError>;
