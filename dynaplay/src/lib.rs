//! # dynaplay
//!
//! Streams an audio file to an output device in real time, compressing the
//! dynamic range of every block on its way to the speaker.
//!
//! **Architecture:** symphonia decode → ringbuf prefetch → block reader →
//! processing adapter (dynamics engine) → streaming scheduler → cpal

pub mod audio;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use controller::{LifecycleController, StreamOutcome, StreamReport, StreamSettings};
pub use error::{Error, Result};
