//! Built-in feed-forward compressor
//!
//! A peak envelope follower with separate attack and release smoothing
//! drives a hard-knee gain computer. Channels are linked: one gain per frame,
//! computed from the loudest channel, so the stereo image does not wander.

use super::DynamicsEngine;

/// Pure-Rust dynamics engine with state carried across blocks
pub struct EnvelopeCompressor {
    sample_rate: f32,
    channels: usize,

    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,

    // Coefficients are recomputed only when the times change
    last_attack_bits: u32,
    last_release_bits: u32,
}

impl EnvelopeCompressor {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            channels: channels.max(1) as usize,
            envelope: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            last_attack_bits: u32::MAX,
            last_release_bits: u32::MAX,
        }
    }

    /// Current envelope level (linear)
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    fn recalc(&mut self, attack_secs: f32, release_secs: f32) {
        self.attack_coeff = smoothing_coeff(attack_secs, self.sample_rate);
        self.release_coeff = smoothing_coeff(release_secs, self.sample_rate);
        self.last_attack_bits = attack_secs.to_bits();
        self.last_release_bits = release_secs.to_bits();
    }
}

/// One-pole smoothing coefficient; zero time means instant response
fn smoothing_coeff(time_secs: f32, sample_rate: f32) -> f32 {
    if time_secs <= 0.0 || sample_rate <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_secs * sample_rate)).exp()
    }
}

/// Linear gain for an envelope level above/below threshold
#[inline]
fn compute_gain(envelope: f32, threshold: f32, ratio: f32) -> f32 {
    if envelope <= threshold || ratio <= 1.0 {
        1.0
    } else {
        (threshold + (envelope - threshold) / ratio) / envelope
    }
}

impl DynamicsEngine for EnvelopeCompressor {
    fn name(&self) -> &str {
        "builtin"
    }

    fn process_buffer(
        &mut self,
        samples: &mut [f32],
        frame_count: usize,
        threshold: f32,
        ratio: f32,
        attack: f32,
        release: f32,
    ) {
        if attack.to_bits() != self.last_attack_bits || release.to_bits() != self.last_release_bits {
            self.recalc(attack, release);
        }

        for frame in samples.chunks_exact_mut(self.channels).take(frame_count) {
            let peak = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

            let coeff = if peak > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * peak;

            let gain = compute_gain(self.envelope, threshold, ratio);
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut EnvelopeCompressor, samples: &mut [f32], channels: usize) {
        let frames = samples.len() / channels;
        engine.process_buffer(samples, frames, 0.5, 4.0, 0.05, 0.5);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut engine = EnvelopeCompressor::new(44100, 2);
        let mut samples = vec![0.25f32; 2048];
        run(&mut engine, &mut samples, 2);
        assert!(samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_loud_signal_reduced() {
        let mut engine = EnvelopeCompressor::new(44100, 1);
        let mut samples = vec![1.0f32; 44100];
        run(&mut engine, &mut samples, 1);

        // Envelope settles near 1.0: gain → (0.5 + 0.5/4) / 1.0 = 0.625
        let last = *samples.last().unwrap();
        assert!((last - 0.625).abs() < 0.01, "settled at {}", last);
        assert!(samples.iter().all(|&s| s <= 1.0));
    }

    #[test]
    fn test_channels_linked() {
        let mut engine = EnvelopeCompressor::new(44100, 2);
        // Left loud, right quiet: both get the same gain
        let mut samples: Vec<f32> = (0..4096).flat_map(|_| [1.0f32, 0.1]).collect();
        run(&mut engine, &mut samples, 2);

        let (l, r) = (samples[8190], samples[8191]);
        assert!(l < 1.0);
        assert!((l / 1.0 - r / 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_state_persists_and_resets() {
        let mut engine = EnvelopeCompressor::new(44100, 1);
        let mut block = vec![1.0f32; 1024];
        run(&mut engine, &mut block, 1);
        let after_first = engine.envelope();
        assert!(after_first > 0.0);

        let mut block = vec![1.0f32; 1024];
        run(&mut engine, &mut block, 1);
        assert!(engine.envelope() > after_first);

        engine.reset();
        assert_eq!(engine.envelope(), 0.0);
    }

    #[test]
    fn test_zero_attack_is_instant() {
        let mut engine = EnvelopeCompressor::new(44100, 1);
        let mut samples = vec![1.0f32; 4];
        engine.process_buffer(&mut samples, 4, 0.5, 4.0, 0.0, 0.0);
        assert!((samples[0] - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_one_is_transparent() {
        assert_eq!(compute_gain(0.9, 0.5, 1.0), 1.0);
        assert_eq!(compute_gain(0.4, 0.5, 4.0), 1.0);
    }
}
