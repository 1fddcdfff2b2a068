//! Core audio data types
//!
//! Defines the stream format, the reusable native-format frame block, and the
//! typed view of a device output buffer.
//!
//! **Byte layout:** frame blocks hold interleaved samples in the source's
//! native sample type and the machine's native byte order. Conversion to the
//! engine's normalized f32 layout happens only in the processing adapter.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Sample encoding of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Unsigned 8-bit, silence at 128
    U8,
    /// Signed 16-bit
    I16,
    /// Signed 32-bit (also carries 24-bit sources, left-justified)
    I32,
    /// 32-bit float, nominal range [-1.0, 1.0]
    F32,
}

impl SampleType {
    /// Width of one sample in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::I16 => 2,
            SampleType::I32 | SampleType::F32 => 4,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::U8 => write!(f, "u8"),
            SampleType::I16 => write!(f, "i16"),
            SampleType::I32 => write!(f, "i32"),
            SampleType::F32 => write!(f, "f32"),
        }
    }
}

/// Stream format, fixed for the lifetime of one stream.
///
/// The output device is configured from exactly this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_type: SampleType,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_type: SampleType) -> Self {
        Self {
            sample_rate,
            channels,
            sample_type,
        }
    }

    /// Bytes in one interleaved frame
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_type.bytes_per_sample()
    }

    /// Playback duration of `frames` frames
    pub fn frames_to_duration(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Reject formats no device can be configured from
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::ContractViolation(
                "format has a sample rate of zero".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(Error::ContractViolation(
                "format has zero channels".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channels, self.sample_type
        )
    }
}

/// Fixed-capacity block of interleaved native-format frames.
///
/// Allocated once before streaming; the block reader refills it in place on
/// every callback.
#[derive(Debug, Clone)]
pub struct FrameBlock {
    format: AudioFormat,
    bytes: Vec<u8>,
    /// Valid bytes at the start of `bytes`
    len: usize,
}

impl FrameBlock {
    /// Allocate a block holding up to `capacity_frames` frames
    pub fn with_capacity(format: AudioFormat, capacity_frames: usize) -> Self {
        Self {
            format,
            bytes: vec![0u8; capacity_frames * format.bytes_per_frame()],
            len: 0,
        }
    }

    /// Wrap raw bytes as a block (length need not be frame aligned)
    pub fn from_bytes(format: AudioFormat, bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self { format, bytes, len }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn capacity_frames(&self) -> usize {
        match self.format.bytes_per_frame() {
            0 => 0,
            bpf => self.bytes.len() / bpf,
        }
    }

    /// Whole frames held by the block
    pub fn frame_count(&self) -> usize {
        match self.format.bytes_per_frame() {
            0 => 0,
            bpf => self.len / bpf,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid bytes of the block
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Writable region for `frames` frames; caller must not exceed capacity
    pub(crate) fn fill_region(&mut self, frames: usize) -> &mut [u8] {
        let end = frames * self.format.bytes_per_frame();
        &mut self.bytes[..end]
    }

    pub(crate) fn set_frame_count(&mut self, frames: usize) {
        self.len = frames * self.format.bytes_per_frame();
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}

/// Convert native-format sample bytes to normalized f32.
///
/// Writes `bytes.len() / width` samples into `out` and returns the count.
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_samples(sample_type: SampleType, bytes: &[u8], out: &mut [f32]) -> usize {
    let width = sample_type.bytes_per_sample();
    let count = (bytes.len() / width).min(out.len());
    let chunks = bytes.chunks_exact(width).take(count);

    match sample_type {
        SampleType::U8 => {
            for (dst, src) in out.iter_mut().zip(chunks) {
                *dst = u8_to_f32(src[0]);
            }
        }
        SampleType::I16 => {
            for (dst, src) in out.iter_mut().zip(chunks) {
                *dst = i16_to_f32(i16::from_ne_bytes([src[0], src[1]]));
            }
        }
        SampleType::I32 => {
            for (dst, src) in out.iter_mut().zip(chunks) {
                *dst = i32_to_f32(i32::from_ne_bytes([src[0], src[1], src[2], src[3]]));
            }
        }
        SampleType::F32 => {
            for (dst, src) in out.iter_mut().zip(chunks) {
                *dst = f32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
            }
        }
    }

    count
}

#[inline]
pub fn u8_to_f32(sample: u8) -> f32 {
    (sample as f32 - 128.0) / 128.0
}

#[inline]
pub fn f32_to_u8(sample: f32) -> u8 {
    (sample * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[inline]
pub fn i32_to_f32(sample: i32) -> f32 {
    (sample as f64 / 2_147_483_648.0) as f32
}

#[inline]
pub fn f32_to_i32(sample: f32) -> i32 {
    (sample as f64 * 2_147_483_648.0)
        .round()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Typed view of the buffer the device asked us to fill
pub enum OutputBuffer<'a> {
    U8(&'a mut [u8]),
    I16(&'a mut [i16]),
    I32(&'a mut [i32]),
    F32(&'a mut [f32]),
}

impl OutputBuffer<'_> {
    /// Length in samples (all channels)
    pub fn len(&self) -> usize {
        match self {
            OutputBuffer::U8(b) => b.len(),
            OutputBuffer::I16(b) => b.len(),
            OutputBuffer::I32(b) => b.len(),
            OutputBuffer::F32(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            OutputBuffer::U8(_) => SampleType::U8,
            OutputBuffer::I16(_) => SampleType::I16,
            OutputBuffer::I32(_) => SampleType::I32,
            OutputBuffer::F32(_) => SampleType::F32,
        }
    }

    /// Silence every sample from `offset` to the end
    pub fn fill_silence(&mut self, offset: usize) {
        match self {
            OutputBuffer::U8(b) => fill_tail(b, offset, 128),
            OutputBuffer::I16(b) => fill_tail(b, offset, 0),
            OutputBuffer::I32(b) => fill_tail(b, offset, 0),
            OutputBuffer::F32(b) => fill_tail(b, offset, 0.0),
        }
    }

    /// Write normalized samples at `offset`, converting to the device type.
    ///
    /// Values are clamped to [-1.0, 1.0].
    pub fn write_f32(&mut self, offset: usize, src: &[f32]) {
        match self {
            OutputBuffer::U8(b) => write_converted(b, offset, src, f32_to_u8),
            OutputBuffer::I16(b) => write_converted(b, offset, src, f32_to_i16),
            OutputBuffer::I32(b) => write_converted(b, offset, src, f32_to_i32),
            OutputBuffer::F32(b) => write_converted(b, offset, src, |s| s.clamp(-1.0, 1.0)),
        }
    }
}

fn fill_tail<T: Copy>(buf: &mut [T], offset: usize, value: T) {
    if offset < buf.len() {
        buf[offset..].fill(value);
    }
}

fn write_converted<T>(buf: &mut [T], offset: usize, src: &[f32], convert: impl Fn(f32) -> T) {
    if offset >= buf.len() {
        return;
    }
    for (dst, &sample) in buf[offset..].iter_mut().zip(src) {
        *dst = convert(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_i16() -> AudioFormat {
        AudioFormat::new(44100, 2, SampleType::I16)
    }

    #[test]
    fn test_bytes_per_frame() {
        assert_eq!(stereo_i16().bytes_per_frame(), 4);
        assert_eq!(AudioFormat::new(48000, 6, SampleType::F32).bytes_per_frame(), 24);
        assert_eq!(AudioFormat::new(8000, 1, SampleType::U8).bytes_per_frame(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_rate_and_channels() {
        assert!(stereo_i16().validate().is_ok());
        assert!(AudioFormat::new(0, 2, SampleType::I16).validate().is_err());
        assert!(AudioFormat::new(44100, 0, SampleType::I16).validate().is_err());
    }

    #[test]
    fn test_frames_to_duration() {
        let d = stereo_i16().frames_to_duration(44100);
        assert_eq!(d, Duration::from_secs(1));
    }

    #[test]
    fn test_frame_block_counts() {
        let mut block = FrameBlock::with_capacity(stereo_i16(), 1024);
        assert_eq!(block.capacity_frames(), 1024);
        assert!(block.is_empty());

        block.set_frame_count(200);
        assert_eq!(block.frame_count(), 200);
        assert_eq!(block.as_bytes().len(), 800);

        block.clear();
        assert_eq!(block.frame_count(), 0);
    }

    #[test]
    fn test_unaligned_block_reports_whole_frames() {
        let block = FrameBlock::from_bytes(stereo_i16(), vec![0u8; 10]);
        assert_eq!(block.frame_count(), 2);
        assert_eq!(block.as_bytes().len(), 10);
    }

    #[test]
    fn test_i16_conversion_is_exact() {
        for &s in &[i16::MIN, -12345, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(f32_to_i16(i16_to_f32(s)), s);
        }
    }

    #[test]
    fn test_u8_conversion() {
        assert_eq!(u8_to_f32(128), 0.0);
        assert_eq!(u8_to_f32(0), -1.0);
        assert_eq!(f32_to_u8(0.0), 128);
        assert_eq!(f32_to_u8(-1.0), 0);
        assert_eq!(f32_to_u8(1.0), 255);
    }

    #[test]
    fn test_decode_samples_i16() {
        let samples: [i16; 4] = [0, 16384, -16384, i16::MIN];
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        let mut out = [9.0f32; 4];

        let n = decode_samples(SampleType::I16, bytes, &mut out);
        assert_eq!(n, 4);
        assert_eq!(out, [0.0, 0.5, -0.5, -1.0]);
    }

    #[test]
    fn test_decode_samples_limited_by_output() {
        let samples = [0.25f32; 8];
        let bytes: &[u8] = bytemuck::cast_slice(&samples);
        let mut out = [0.0f32; 3];

        assert_eq!(decode_samples(SampleType::F32, bytes, &mut out), 3);
        assert_eq!(out, [0.25; 3]);
    }

    #[test]
    fn test_output_buffer_write_and_silence() {
        let mut data = [7u8; 6];
        let mut out = OutputBuffer::U8(&mut data);
        out.write_f32(0, &[0.0, -1.0]);
        out.fill_silence(2);
        assert_eq!(data, [128, 0, 128, 128, 128, 128]);
    }

    #[test]
    fn test_output_buffer_clamps_f32() {
        let mut data = [0.0f32; 3];
        OutputBuffer::F32(&mut data).write_f32(0, &[1.5, -2.0, 0.25]);
        assert_eq!(data, [1.0, -1.0, 0.25]);
    }
}
