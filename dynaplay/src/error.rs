//! Error types for dynaplay
//!
//! Load-time failures (`SourceUnavailable`, `EngineUnavailable`, and device
//! setup `AudioOutput`) are raised before the device is armed. `DecodeFailure`
//! and `ContractViolation` abort a running stream. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dynaplay
#[derive(Error, Debug)]
pub enum Error {
    /// Input file missing, unreadable, or in an unsupported format
    #[error("Source unavailable ({path}): {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Dynamics engine missing or failing its contract check
    #[error("Dynamics engine unavailable: {0}")]
    EngineUnavailable(String),

    /// I/O or corrupt data while streaming
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Shape or format mismatch between pipeline components
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Compressor parameters out of range
    #[error("Invalid compressor parameters: {0}")]
    InvalidParameters(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<dynaplay_common::Error> for Error {
    fn from(err: dynaplay_common::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Convenience Result type using dynaplay Error
pub type Result<T> = std::result::Result<T, Error>;
