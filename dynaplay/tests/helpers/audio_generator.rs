//! Audio test file generation
//!
//! Deterministic 16-bit WAV files for decoder tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write `frames` frames whose samples count up from 1 (see
/// `counting_samples`)
pub fn generate_ramp_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    for sample in super::counting_samples(frames, channels as usize) {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Write a sine tone at `amplitude` (0.0-1.0) on every channel
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(sample_rate, channels))?;
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let value = (amplitude * (2.0 * PI * frequency_hz * t).sin() * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()
}
