//! Deterministic dynamics engines for tests

use dynaplay::engine::DynamicsEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Frame counts passed to each engine call, shared with the test
pub type EngineCalls = Arc<Mutex<Vec<usize>>>;

/// Multiplies every sample by a fixed gain and records each call
pub struct GainEngine {
    gain: f32,
    calls: EngineCalls,
}

impl GainEngine {
    pub fn new(gain: f32) -> (Self, EngineCalls) {
        let calls = EngineCalls::default();
        (
            Self {
                gain,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl DynamicsEngine for GainEngine {
    fn name(&self) -> &str {
        "gain"
    }

    fn process_buffer(&mut self, samples: &mut [f32], frame_count: usize, _: f32, _: f32, _: f32, _: f32) {
        self.calls.lock().unwrap().push(frame_count);
        for s in samples.iter_mut() {
            *s *= self.gain;
        }
    }

    fn reset(&mut self) {
        // Verification calls are not part of the stream
        self.calls.lock().unwrap().clear();
    }
}

/// Produces NaN: fails engine verification
pub struct NanEngine;

impl DynamicsEngine for NanEngine {
    fn name(&self) -> &str {
        "nan"
    }

    fn process_buffer(&mut self, samples: &mut [f32], _: usize, _: f32, _: f32, _: f32, _: f32) {
        samples.fill(f32::NAN);
    }
}

/// Pass-through engine that takes `delay` per call
pub struct SlowEngine {
    pub delay: Duration,
}

impl DynamicsEngine for SlowEngine {
    fn name(&self) -> &str {
        "slow"
    }

    fn process_buffer(&mut self, _: &mut [f32], _: usize, _: f32, _: f32, _: f32, _: f32) {
        std::thread::sleep(self.delay);
    }
}
