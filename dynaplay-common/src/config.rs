//! Bootstrap configuration loading
//!
//! The TOML file is optional. Resolution order for its location:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<config_dir>/dynaplay/config.toml` when it exists
//! 4. No file: every setting falls back to its built-in default
//!
//! Values here are raw and optional; the player validates them and fills in
//! defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DYNAPLAY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Output device name (default device when absent)
    #[serde(default)]
    pub device: Option<String>,

    /// Frames per processing block
    #[serde(default)]
    pub block_frames: Option<usize>,

    /// Decode-ahead window in milliseconds (0 disables prefetch)
    #[serde(default)]
    pub prefetch_ms: Option<u32>,

    /// Dynamics engine: "builtin" or "native"
    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default)]
    pub compressor: CompressorSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[compressor]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressorSection {
    pub threshold: Option<f32>,
    pub ratio: Option<f32>,
    /// Attack time in seconds
    pub attack: Option<f32>,
    /// Release time in seconds
    pub release: Option<f32>,
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl TomlConfig {
    /// Reject values that cannot be interpreted at all
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::Config(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }
        if let Some(engine) = &self.engine {
            if engine.is_empty() {
                return Err(Error::Config("engine must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Locate the config file to load, if any.
///
/// An explicitly named file (CLI or environment) is returned even when it
/// does not exist so that loading reports the problem. The per-user default
/// location is only returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config directory
    let user_config = default_config_path()?;
    if user_config.exists() {
        Some(user_config)
    } else {
        None
    }
}

/// Default per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dynaplay").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_toml_config(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Parse TOML text into a config
pub fn parse_toml_config(content: &str) -> std::result::Result<TomlConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Resolve and load configuration; no file means defaults.
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
        Some(path) => {
            debug!("Loading config file {}", path.display());
            load_toml_config(&path)
        }
        None => {
            debug!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
