//! Decoded sources
//!
//! A decoded source turns an audio file (or pre-decoded memory) into a
//! fixed-format stream of interleaved native-format frames.
//!
//! # Supported Formats
//!
//! Per Cargo.toml symphonia features: WAV/PCM, MP3, FLAC, AAC, MP4/M4A,
//! Vorbis.
//!
//! # Sample Format
//!
//! Integer PCM keeps its width (8 → u8, 16 → i16, 24/32 → i32); lossy and
//! float codecs decode to f32.

use crate::audio::types::{AudioFormat, SampleType};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat as SymphoniaSampleFormat;
use tracing::{debug, warn};

/// Result of one `read_frames` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRead {
    /// Whole frames written to the destination
    pub frames: usize,
    /// No frames will follow the ones just returned
    pub exhausted: bool,
}

/// A fixed-format stream of decoded frames.
///
/// `read_frames` fills `dst` (a whole number of frames) and reports how many
/// frames were written. A source that is not exhausted may return fewer
/// frames than requested only when it cannot produce more without blocking.
pub trait FrameSource: Send {
    /// Format of every frame this source yields
    fn format(&self) -> AudioFormat;

    /// Read up to `dst.len() / bytes_per_frame` frames
    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        (**self).read_frames(dst)
    }
}

/// Pre-decoded frames held in memory
pub struct MemorySource {
    format: AudioFormat,
    bytes: Vec<u8>,
    position: usize,
}

impl MemorySource {
    /// Wrap interleaved native-format bytes; a trailing partial frame is dropped
    pub fn new(format: AudioFormat, mut bytes: Vec<u8>) -> Self {
        let bpf = format.bytes_per_frame().max(1);
        bytes.truncate(bytes.len() / bpf * bpf);
        Self {
            format,
            bytes,
            position: 0,
        }
    }

    /// Build a source from typed interleaved samples
    pub fn from_samples<T: bytemuck::Pod>(format: AudioFormat, samples: &[T]) -> Self {
        Self::new(format, bytemuck::cast_slice(samples).to_vec())
    }

    /// Total frames held
    pub fn total_frames(&self) -> usize {
        self.bytes.len() / self.format.bytes_per_frame().max(1)
    }
}

impl FrameSource for MemorySource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        let bpf = self.format.bytes_per_frame();
        let remaining = &self.bytes[self.position..];
        let take = (dst.len() / bpf).min(remaining.len() / bpf) * bpf;

        dst[..take].copy_from_slice(&remaining[..take]);
        self.position += take;

        Ok(SourceRead {
            frames: take / bpf,
            exhausted: self.position >= self.bytes.len(),
        })
    }
}

/// Reusable interleaving buffer for the output sample type
enum Interleaver {
    U8(Option<SampleBuffer<u8>>),
    I16(Option<SampleBuffer<i16>>),
    I32(Option<SampleBuffer<i32>>),
    F32(Option<SampleBuffer<f32>>),
}

impl Interleaver {
    fn for_type(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::U8 => Interleaver::U8(None),
            SampleType::I16 => Interleaver::I16(None),
            SampleType::I32 => Interleaver::I32(None),
            SampleType::F32 => Interleaver::F32(None),
        }
    }

    /// Append the decoded packet to `pending` as interleaved native bytes
    fn append(&mut self, decoded: AudioBufferRef<'_>, pending: &mut Vec<u8>) {
        match self {
            Interleaver::U8(slot) => append_interleaved(slot, decoded, pending),
            Interleaver::I16(slot) => append_interleaved(slot, decoded, pending),
            Interleaver::I32(slot) => append_interleaved(slot, decoded, pending),
            Interleaver::F32(slot) => append_interleaved(slot, decoded, pending),
        }
    }
}

fn append_interleaved<T>(
    slot: &mut Option<SampleBuffer<T>>,
    decoded: AudioBufferRef<'_>,
    pending: &mut Vec<u8>,
) where
    T: ConvertibleSample + bytemuck::Pod,
{
    let spec = *decoded.spec();
    let needed = decoded.capacity() * spec.channels.count();

    if slot.as_ref().map_or(true, |buf| buf.capacity() < needed) {
        *slot = Some(SampleBuffer::<T>::new(decoded.capacity() as u64, spec));
    }
    let Some(buf) = slot.as_mut() else {
        return;
    };

    buf.copy_interleaved_ref(decoded);
    pending.extend_from_slice(bytemuck::cast_slice(buf.samples()));
}

/// Undecodable packets tolerated in a row before the stream is failed
pub const MAX_CONSECUTIVE_DECODE_ERRORS: u32 = 3;

/// Reject a decoded packet whose layout differs from the stream format.
///
/// Appending it would misalign every following frame.
fn check_packet_spec(spec: &SignalSpec, format: &AudioFormat) -> Result<()> {
    let channels = spec.channels.count();
    if channels != format.channels as usize || spec.rate != format.sample_rate {
        return Err(Error::ContractViolation(format!(
            "decoded packet is {} Hz/{}ch, stream is {} Hz/{}ch",
            spec.rate, channels, format.sample_rate, format.channels
        )));
    }
    Ok(())
}

/// Audio file decoder using symphonia.
///
/// Decodes packet by packet; frames not yet handed out are kept in a
/// pending byte buffer.
pub struct SymphoniaSource {
    path: PathBuf,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    interleaver: Interleaver,
    pending: Vec<u8>,
    pending_pos: usize,
    end_of_stream: bool,
    decode_errors: u32,
}

impl SymphoniaSource {
    /// Open and probe an audio file.
    ///
    /// # Errors
    /// `SourceUnavailable` when the file cannot be opened, the container or
    /// codec is unsupported, or no audio track describes its format.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| Error::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        let file = File::open(&path).map_err(|e| unavailable(format!("cannot open: {}", e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| unavailable(format!("unsupported format: {}", e)))?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unavailable("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| unavailable("sample rate not found".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| unavailable("channel count not found".to_string()))?;
        let sample_type = native_sample_type(codec_params.sample_format, codec_params.bits_per_sample);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| unavailable(format!("unsupported codec: {}", e)))?;

        let format = AudioFormat::new(sample_rate, channels, sample_type);
        format.validate().map_err(|e| unavailable(e.to_string()))?;

        debug!("Opened {}: {}", path.display(), format);

        Ok(Self {
            path,
            format_reader,
            decoder,
            track_id,
            format,
            interleaver: Interleaver::for_type(sample_type),
            pending: Vec::new(),
            pending_pos: 0,
            end_of_stream: false,
            decode_errors: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns false at end of stream. A single corrupt packet is skipped;
    /// more than [`MAX_CONSECUTIVE_DECODE_ERRORS`] in a row is a
    /// `DecodeFailure`.
    fn decode_next_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::DecodeFailure(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    )));
                }
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    check_packet_spec(decoded.spec(), &self.format)?;
                    self.decode_errors = 0;
                    self.pending.clear();
                    self.pending_pos = 0;
                    self.interleaver.append(decoded, &mut self.pending);
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    self.decode_errors += 1;
                    if self.decode_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(Error::DecodeFailure(format!(
                            "{}: {} consecutive undecodable packets: {}",
                            self.path.display(),
                            self.decode_errors,
                            e
                        )));
                    }
                    warn!("Skipping undecodable packet in {}: {}", self.path.display(), e);
                }
                Err(e) => {
                    return Err(Error::DecodeFailure(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    )));
                }
            }
        }
    }
}

impl FrameSource for SymphoniaSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        let bpf = self.format.bytes_per_frame();
        let wanted = dst.len() / bpf * bpf;
        let mut filled = 0;

        while filled < wanted {
            if self.pending_pos >= self.pending.len() {
                if self.end_of_stream || !self.decode_next_packet()? {
                    self.end_of_stream = true;
                    break;
                }
                continue;
            }

            let available = &self.pending[self.pending_pos..];
            let take = available.len().min(wanted - filled);
            dst[filled..filled + take].copy_from_slice(&available[..take]);
            filled += take;
            self.pending_pos += take;
        }

        if filled % bpf != 0 {
            return Err(Error::DecodeFailure(format!(
                "{}: stream ended inside a frame",
                self.path.display()
            )));
        }

        Ok(SourceRead {
            frames: filled / bpf,
            exhausted: self.end_of_stream && self.pending_pos >= self.pending.len(),
        })
    }
}

/// Map codec parameters to the sample type frames are delivered in
fn native_sample_type(
    sample_format: Option<SymphoniaSampleFormat>,
    bits_per_sample: Option<u32>,
) -> SampleType {
    match sample_format {
        Some(SymphoniaSampleFormat::U8) => return SampleType::U8,
        Some(SymphoniaSampleFormat::S8)
        | Some(SymphoniaSampleFormat::S16)
        | Some(SymphoniaSampleFormat::U16) => return SampleType::I16,
        Some(SymphoniaSampleFormat::F32) | Some(SymphoniaSampleFormat::F64) => return SampleType::F32,
        Some(_) => return SampleType::I32,
        None => {}
    }

    match bits_per_sample {
        Some(bits) if bits <= 8 => SampleType::U8,
        Some(bits) if bits <= 16 => SampleType::I16,
        Some(_) => SampleType::I32,
        // Lossy codecs carry no bit depth and decode to float
        None => SampleType::F32,
    }
}
