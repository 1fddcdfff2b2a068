//! External dynamics engine (libcompressor)
//!
//! Binds the C entry point
//! `void process_audio_buffer(float *buffer, int size, float threshold,
//! float ratio, float attack, float release)`, where `size` is the number
//! of samples in the buffer (all channels). The library starts a fresh
//! compressor on every call, so no envelope state carries across blocks.
//!
//! # Safety
//! The buffer pointer is valid for `size` f32 values for the duration of the
//! call; the library does not retain it.

use super::DynamicsEngine;
use std::os::raw::c_int;

mod ffi {
    use super::*;

    #[link(name = "compressor")]
    extern "C" {
        pub fn process_audio_buffer(
            buffer: *mut f32,
            size: c_int,
            threshold: f32,
            ratio: f32,
            attack: f32,
            release: f32,
        );
    }
}

/// Dynamics engine backed by the linked native library
pub struct NativeEngine {
    channels: usize,
}

impl NativeEngine {
    pub fn new(channels: u16) -> Self {
        Self {
            channels: channels.max(1) as usize,
        }
    }
}

impl DynamicsEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
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
        let len = (frame_count * self.channels).min(samples.len());

        // `int` may be narrower than the buffer; feed whole-frame chunks
        let max_chunk = (c_int::MAX as usize / self.channels) * self.channels;
        for chunk in samples[..len].chunks_mut(max_chunk.max(self.channels)) {
            // SAFETY: chunk is a live, exclusive f32 slice of chunk.len() elements
            // and chunk.len() <= c_int::MAX.
            unsafe {
                ffi::process_audio_buffer(
                    chunk.as_mut_ptr(),
                    chunk.len() as c_int,
                    threshold,
                    ratio,
                    attack,
                    release,
                );
            }
        }
    }
}
