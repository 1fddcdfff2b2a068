//! Processing adapter
//!
//! Converts a native-format block to contiguous normalized f32 and hands it
//! to the dynamics engine in place, together with the frame count and the
//! four compressor controls.
//!
//! **REAL-TIME SAFE:** no allocation, no I/O, no locks. The caller supplies
//! the f32 scratch buffer.

use crate::audio::types::{decode_samples, AudioFormat, FrameBlock};
use crate::engine::{CompressorParameters, DynamicsEngine};
use crate::error::{Error, Result};

pub struct ProcessingAdapter {
    engine: Box<dyn DynamicsEngine>,
    format: AudioFormat,
    params: CompressorParameters,
}

impl ProcessingAdapter {
    pub fn new(
        engine: Box<dyn DynamicsEngine>,
        format: AudioFormat,
        params: CompressorParameters,
    ) -> Self {
        Self {
            engine,
            format,
            params,
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn params(&self) -> &CompressorParameters {
        &self.params
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Convert and process `block`, writing normalized samples to `out`.
    ///
    /// Returns the number of samples written (`frames * channels`). An empty
    /// block writes nothing and does not call the engine.
    pub fn process(&mut self, block: &FrameBlock, out: &mut [f32]) -> Result<usize> {
        if *block.format() != self.format {
            return Err(Error::ContractViolation(format!(
                "block format {} does not match stream format {}",
                block.format(),
                self.format
            )));
        }

        let bytes = block.as_bytes();
        let bpf = self.format.bytes_per_frame();
        if bpf == 0 || bytes.len() % bpf != 0 {
            return Err(Error::ContractViolation(format!(
                "block of {} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                bpf
            )));
        }

        let frames = bytes.len() / bpf;
        let samples = frames * self.format.channels as usize;
        if samples > out.len() {
            return Err(Error::ContractViolation(format!(
                "block of {} samples exceeds output buffer of {}",
                samples,
                out.len()
            )));
        }
        if frames == 0 {
            return Ok(0);
        }

        let written = decode_samples(self.format.sample_type, bytes, &mut out[..samples]);
        debug_assert_eq!(written, samples);

        let p = self.params;
        self.engine.process_buffer(
            &mut out[..samples],
            frames,
            p.threshold,
            p.ratio,
            p.attack_secs,
            p.release_secs,
        );

        Ok(samples)
    }
}
