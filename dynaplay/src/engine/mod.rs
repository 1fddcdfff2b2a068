//! Dynamics engines
//!
//! An engine mutates a contiguous buffer of normalized, interleaved f32
//! samples in place. It is called synchronously from the audio callback, so
//! implementations must run in bounded time without allocating or locking.

pub mod envelope;
#[cfg(feature = "native-engine")]
pub mod native;

pub use envelope::EnvelopeCompressor;
#[cfg(feature = "native-engine")]
pub use native::NativeEngine;

use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use tracing::{debug, info};

/// Default compression threshold (linear amplitude)
pub const DEFAULT_THRESHOLD: f32 = 0.5;
/// Default compression ratio
pub const DEFAULT_RATIO: f32 = 4.0;
/// Default attack time in seconds
pub const DEFAULT_ATTACK_SECS: f32 = 0.05;
/// Default release time in seconds
pub const DEFAULT_RELEASE_SECS: f32 = 0.5;

/// Largest magnitude a verified engine may produce from the probe signal
const PROBE_MAX_MAGNITUDE: f32 = 16.0;

/// Buffer-processing contract of a dynamics engine.
///
/// `samples.len()` is always `frame_count * channels`; the engine may only
/// change sample values.
pub trait DynamicsEngine: Send {
    /// Identifier used in logs
    fn name(&self) -> &str;

    fn process_buffer(
        &mut self,
        samples: &mut [f32],
        frame_count: usize,
        threshold: f32,
        ratio: f32,
        attack: f32,
        release: f32,
    );

    /// Return to the initial state (no-op for stateless engines)
    fn reset(&mut self) {}
}

/// Compressor control values, fixed for the lifetime of a stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParameters {
    /// Linear amplitude in (0, 1]
    pub threshold: f32,
    /// Input:output ratio above threshold, >= 1
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl CompressorParameters {
    /// Validate and build parameters
    pub fn new(threshold: f32, ratio: f32, attack_secs: f32, release_secs: f32) -> Result<Self> {
        let all = [threshold, ratio, attack_secs, release_secs];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameters(format!(
                "non-finite value in threshold={} ratio={} attack={} release={}",
                threshold, ratio, attack_secs, release_secs
            )));
        }
        if threshold <= 0.0 || threshold > 1.0 {
            return Err(Error::InvalidParameters(format!(
                "threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if ratio < 1.0 {
            return Err(Error::InvalidParameters(format!(
                "ratio must be >= 1, got {}",
                ratio
            )));
        }
        if attack_secs < 0.0 || release_secs < 0.0 {
            return Err(Error::InvalidParameters(format!(
                "attack/release must be >= 0, got {}/{}",
                attack_secs, release_secs
            )));
        }

        Ok(Self {
            threshold,
            ratio,
            attack_secs,
            release_secs,
        })
    }
}

impl Default for CompressorParameters {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            ratio: DEFAULT_RATIO,
            attack_secs: DEFAULT_ATTACK_SECS,
            release_secs: DEFAULT_RELEASE_SECS,
        }
    }
}

/// Create an engine by kind ("builtin" or "native")
pub fn load_engine(kind: &str, format: &AudioFormat) -> Result<Box<dyn DynamicsEngine>> {
    match kind {
        "builtin" => Ok(Box::new(EnvelopeCompressor::new(
            format.sample_rate,
            format.channels,
        ))),
        #[cfg(feature = "native-engine")]
        "native" => Ok(Box::new(NativeEngine::new(format.channels))),
        #[cfg(not(feature = "native-engine"))]
        "native" => Err(Error::EngineUnavailable(
            "native engine support not compiled in (enable the `native-engine` feature)"
                .to_string(),
        )),
        other => Err(Error::EngineUnavailable(format!(
            "unknown engine '{}' (expected 'builtin' or 'native')",
            other
        ))),
    }
}

/// Check an engine against its contract before any audio flows.
///
/// Runs one block of a loud probe tone through the engine; the output must
/// be finite and bounded. The engine is reset afterwards so streaming
/// starts from its initial state.
pub fn verify_engine(
    engine: &mut dyn DynamicsEngine,
    format: &AudioFormat,
    params: &CompressorParameters,
) -> Result<()> {
    const PROBE_FRAMES: usize = 256;

    let channels = format.channels as usize;
    if channels == 0 {
        return Err(Error::EngineUnavailable(
            "cannot verify engine against a zero-channel format".to_string(),
        ));
    }

    let mut probe: Vec<f32> = (0..PROBE_FRAMES * channels)
        .map(|i| {
            let frame = (i / channels) as f32;
            0.9 * (frame * 0.07).sin()
        })
        .collect();

    debug!("Verifying dynamics engine '{}'", engine.name());

    engine.process_buffer(
        &mut probe,
        PROBE_FRAMES,
        params.threshold,
        params.ratio,
        params.attack_secs,
        params.release_secs,
    );

    if let Some(bad) = probe
        .iter()
        .find(|s| !s.is_finite() || s.abs() > PROBE_MAX_MAGNITUDE)
    {
        return Err(Error::EngineUnavailable(format!(
            "engine '{}' produced invalid output ({}) for the probe signal",
            engine.name(),
            bad
        )));
    }

    engine.reset();
    info!("Dynamics engine '{}' verified", engine.name());
    Ok(())
}
