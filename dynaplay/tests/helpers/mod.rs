//! Test helper modules for dynaplay integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeDevice: output device driving the render callback from a thread
//! - Test engines: deterministic and deliberately broken dynamics engines
//! - Test sources: endless, failing and drop-tracking frame sources
//! - WAV generation for decoder tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod fake_device;
pub mod test_engines;
pub mod test_sources;

pub use audio_generator::{generate_ramp_wav, generate_sine_wav};
pub use fake_device::{DeviceEvent, DeviceLog, FakeDevice};
pub use test_engines::{EngineCalls, GainEngine, NanEngine, SlowEngine};
pub use test_sources::{counting_samples, DropFlagSource, EndlessSource, FailAfterSource};
