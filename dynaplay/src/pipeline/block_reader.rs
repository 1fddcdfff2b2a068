//! Block reader
//!
//! Pulls fixed-size blocks of native-format frames from a decoded source and
//! tracks end-of-stream. Once the source reports exhaustion it is never read
//! again.

use crate::audio::source::FrameSource;
use crate::audio::types::{AudioFormat, FrameBlock};
use crate::error::{Error, Result};

pub struct BlockReader {
    source: Box<dyn FrameSource>,
    format: AudioFormat,
    capacity_frames: usize,
    exhausted: bool,
}

impl BlockReader {
    /// Wrap `source`; blocks handed to `next_block` must hold
    /// `capacity_frames` frames
    pub fn new(source: Box<dyn FrameSource>, capacity_frames: usize) -> Self {
        let format = source.format();
        Self {
            source,
            format,
            capacity_frames,
            exhausted: false,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fill `block` with up to `requested` frames.
    ///
    /// Returns `is_final`: true when no frames follow the ones in `block`.
    /// A final block may be short or empty. **REAL-TIME SAFE** when the
    /// source is.
    pub fn next_block(&mut self, block: &mut FrameBlock, requested: usize) -> Result<bool> {
        if requested > self.capacity_frames || requested > block.capacity_frames() {
            return Err(Error::ContractViolation(format!(
                "requested {} frames from a block reader of capacity {}",
                requested,
                self.capacity_frames.min(block.capacity_frames())
            )));
        }
        if *block.format() != self.format {
            return Err(Error::ContractViolation(format!(
                "block format {} does not match source format {}",
                block.format(),
                self.format
            )));
        }

        block.clear();
        if self.exhausted {
            return Ok(true);
        }

        let read = self.source.read_frames(block.fill_region(requested))?;
        if read.frames > requested {
            return Err(Error::ContractViolation(format!(
                "source returned {} frames for a request of {}",
                read.frames, requested
            )));
        }
        block.set_frame_count(read.frames);

        if read.exhausted {
            self.exhausted = true;
        }
        Ok(read.exhausted)
    }
}
