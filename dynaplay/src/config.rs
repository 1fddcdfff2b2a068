//! Player configuration
//!
//! Merges command-line overrides, the optional TOML file and built-in
//! defaults, in that order of priority, then validates the result.

use crate::controller::{StreamSettings, DEFAULT_BLOCK_FRAMES};
use crate::engine::{
    CompressorParameters, DEFAULT_ATTACK_SECS, DEFAULT_RATIO, DEFAULT_RELEASE_SECS,
    DEFAULT_THRESHOLD,
};
use crate::error::{Error, Result};
use dynaplay_common::TomlConfig;
use tracing::debug;

/// Default decode-ahead window
pub const DEFAULT_PREFETCH_MS: u32 = 500;

/// Largest accepted decode-ahead window
pub const MAX_PREFETCH_MS: u32 = 60_000;

/// Default dynamics engine
pub const DEFAULT_ENGINE: &str = "builtin";

/// Largest accepted block size
pub const MAX_BLOCK_FRAMES: usize = 65536;

/// Values supplied on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub engine: Option<String>,
    pub block_frames: Option<usize>,
    pub prefetch_ms: Option<u32>,
    pub threshold: Option<f32>,
    pub ratio: Option<f32>,
    pub attack: Option<f32>,
    pub release: Option<f32>,
}

/// Fully resolved player configuration
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,
    pub engine: String,
    pub block_frames: usize,
    /// Decode-ahead window, never zero
    pub prefetch_ms: u32,
    pub params: CompressorParameters,
}

impl PlayerConfig {
    /// Resolve settings: CLI > TOML > defaults
    pub fn resolve(toml: &TomlConfig, cli: &ConfigOverrides) -> Result<Self> {
        let compressor = &toml.compressor;

        let block_frames = cli
            .block_frames
            .or(toml.block_frames)
            .unwrap_or(DEFAULT_BLOCK_FRAMES);
        if block_frames == 0 || block_frames > MAX_BLOCK_FRAMES {
            return Err(Error::Config(format!(
                "block_frames must be between 1 and {}, got {}",
                MAX_BLOCK_FRAMES, block_frames
            )));
        }

        let engine = cli
            .engine
            .clone()
            .or_else(|| toml.engine.clone())
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());
        if engine != "builtin" && engine != "native" {
            return Err(Error::Config(format!(
                "engine must be 'builtin' or 'native', got '{}'",
                engine
            )));
        }

        // The render path never decodes, so a decode-ahead window is required
        let prefetch_ms = cli
            .prefetch_ms
            .or(toml.prefetch_ms)
            .unwrap_or(DEFAULT_PREFETCH_MS);
        if prefetch_ms == 0 || prefetch_ms > MAX_PREFETCH_MS {
            return Err(Error::Config(format!(
                "prefetch_ms must be between 1 and {}, got {}",
                MAX_PREFETCH_MS, prefetch_ms
            )));
        }

        let params = CompressorParameters::new(
            cli.threshold
                .or(compressor.threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            cli.ratio.or(compressor.ratio).unwrap_or(DEFAULT_RATIO),
            cli.attack.or(compressor.attack).unwrap_or(DEFAULT_ATTACK_SECS),
            cli.release
                .or(compressor.release)
                .unwrap_or(DEFAULT_RELEASE_SECS),
        )?;

        let config = Self {
            device: cli.device.clone().or_else(|| toml.device.clone()),
            engine,
            block_frames,
            prefetch_ms,
            params,
        };

        debug!("Resolved config: {:?}", config);
        Ok(config)
    }

    /// Decode-ahead capacity in frames at `sample_rate`, at least one block
    pub fn prefetch_frames(&self, sample_rate: u32) -> usize {
        let frames = (self.prefetch_ms as u64 * sample_rate as u64 / 1000) as usize;
        frames.max(self.block_frames)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            block_frames: self.block_frames,
            params: self.params,
            ..StreamSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynaplay_common::config::parse_toml_config;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::resolve(&TomlConfig::default(), &ConfigOverrides::default())
            .unwrap();

        assert_eq!(config.block_frames, 1024);
        assert_eq!(config.engine, "builtin");
        assert_eq!(config.prefetch_ms, 500);
        assert_eq!(config.params, CompressorParameters::default());
        assert!(config.device.is_none());
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = parse_toml_config(
            r#"
            device = "USB DAC"
            block_frames = 512

            [compressor]
            threshold = 0.3
            ratio = 2.0
            "#,
        )
        .unwrap();
        let cli = ConfigOverrides {
            block_frames: Some(256),
            ratio: Some(8.0),
            ..Default::default()
        };

        let config = PlayerConfig::resolve(&toml, &cli).unwrap();
        assert_eq!(config.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.block_frames, 256);
        assert_eq!(config.params.threshold, 0.3);
        assert_eq!(config.params.ratio, 8.0);
        assert_eq!(config.params.attack_secs, 0.05);
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_block = ConfigOverrides {
            block_frames: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            PlayerConfig::resolve(&TomlConfig::default(), &zero_block),
            Err(Error::Config(_))
        ));

        let bad_engine = ConfigOverrides {
            engine: Some("tape".to_string()),
            ..Default::default()
        };
        assert!(PlayerConfig::resolve(&TomlConfig::default(), &bad_engine).is_err());

        let bad_ratio = ConfigOverrides {
            ratio: Some(0.5),
            ..Default::default()
        };
        assert!(matches!(
            PlayerConfig::resolve(&TomlConfig::default(), &bad_ratio),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_prefetch_frames() {
        let config = PlayerConfig::resolve(&TomlConfig::default(), &ConfigOverrides::default())
            .unwrap();
        assert_eq!(config.prefetch_frames(44100), 22050);

        let tiny = ConfigOverrides {
            prefetch_ms: Some(1),
            ..Default::default()
        };
        let config = PlayerConfig::resolve(&TomlConfig::default(), &tiny).unwrap();
        assert_eq!(config.prefetch_frames(44100), 1024);
    }

    #[test]
    fn test_zero_prefetch_rejected() {
        let no_prefetch = ConfigOverrides {
            prefetch_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            PlayerConfig::resolve(&TomlConfig::default(), &no_prefetch),
            Err(Error::Config(_))
        ));

        let toml = parse_toml_config("prefetch_ms = 0").unwrap();
        assert!(matches!(
            PlayerConfig::resolve(&toml, &ConfigOverrides::default()),
            Err(Error::Config(_))
        ));
    }
}
