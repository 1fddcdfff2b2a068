//! Common error types for dynaplay

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for dynaplay-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating or loading bootstrap configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
