//! Frame sources with controlled behavior

use dynaplay::audio::{AudioFormat, FrameSource, SourceRead};
use dynaplay::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Interleaved i16 samples 1, 2, 3, ... wrapping below i16::MAX
pub fn counting_samples(frames: usize, channels: usize) -> Vec<i16> {
    (0..frames * channels).map(|i| (i % 30_000) as i16 + 1).collect()
}

/// Never runs out; every sample is `value`
pub struct EndlessSource {
    pub format: AudioFormat,
    pub value: i16,
}

impl FrameSource for EndlessSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        let bpf = self.format.bytes_per_frame();
        let frames = dst.len() / bpf;
        let bytes = self.value.to_ne_bytes();
        for pair in dst[..frames * bpf].chunks_exact_mut(2) {
            pair.copy_from_slice(&bytes);
        }
        Ok(SourceRead { frames, exhausted: false })
    }
}

/// Yields `good_frames` non-silent frames, then fails
pub struct FailAfterSource {
    pub format: AudioFormat,
    pub good_frames: usize,
}

impl FrameSource for FailAfterSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        if self.good_frames == 0 {
            return Err(Error::DecodeFailure("corrupt packet".to_string()));
        }
        let bpf = self.format.bytes_per_frame();
        let frames = (dst.len() / bpf).min(self.good_frames);
        dst[..frames * bpf].fill(0x11);
        self.good_frames -= frames;
        Ok(SourceRead { frames, exhausted: false })
    }
}

/// Wraps a source and raises a flag when dropped
pub struct DropFlagSource<S: FrameSource> {
    inner: S,
    dropped: Arc<AtomicBool>,
}

impl<S: FrameSource> DropFlagSource<S> {
    pub fn new(inner: S) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner,
                dropped: Arc::clone(&dropped),
            },
            dropped,
        )
    }
}

impl<S: FrameSource> FrameSource for DropFlagSource<S> {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        self.inner.read_frames(dst)
    }
}

impl<S: FrameSource> Drop for DropFlagSource<S> {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
