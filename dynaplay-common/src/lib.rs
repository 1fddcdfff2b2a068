//! # dynaplay Common Library
//!
//! Shared code for the dynaplay workspace:
//! - Bootstrap configuration (TOML file resolution and loading)
//! - Common error type

pub mod config;
pub mod error;

pub use config::{CompressorSection, LoggingConfig, TomlConfig};
pub use error::{Error, Result};
