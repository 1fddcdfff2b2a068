//! Audio output using cpal
//!
//! Defines the output device contract the lifecycle controller drives, and
//! its cpal implementation.
//!
//! The device is configured once, from the stream's exact `AudioFormat`, and
//! invokes the registered `RenderCallback` on its own real-time thread.

use crate::audio::types::{AudioFormat, OutputBuffer, SampleType};
use crate::error::{Error, Result};
use crate::pipeline::state::StreamStatus;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig, SupportedBufferSize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the render callback asks of the device after an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// Keep invoking
    Continue,
    /// Source finished; play out queued audio, then stop
    Complete,
    /// Stream failed; stop as soon as possible
    Abort,
}

/// Data-supply callback registered with an output device.
///
/// Runs on the device's real-time thread: implementations must not block,
/// allocate, or log.
pub trait RenderCallback: Send {
    /// Fill `out` completely (silence where no audio is available)
    fn render(&mut self, out: OutputBuffer<'_>) -> CallbackFlow;
}

/// Output device contract
pub trait OutputDevice {
    /// Configure the device from `format` and register `callback`.
    ///
    /// Device-side errors raised later are reported through `status`.
    fn open(
        &mut self,
        format: &AudioFormat,
        block_frames: usize,
        callback: Box<dyn RenderCallback>,
        status: Arc<StreamStatus>,
    ) -> Result<()>;

    /// Begin invoking the callback
    fn start(&mut self) -> Result<()>;

    /// Stop invoking the callback; an in-flight invocation finishes first
    fn stop(&mut self) -> Result<()>;

    /// True between a successful `start` and `stop`/`close`
    fn is_active(&self) -> bool;

    /// Release the stream and the registered callback
    fn close(&mut self);
}

/// Sample types cpal can hand to our render callback
trait DeviceSample: SizedSample + Send + 'static {
    fn wrap(data: &mut [Self]) -> OutputBuffer<'_>;
}

impl DeviceSample for u8 {
    fn wrap(data: &mut [Self]) -> OutputBuffer<'_> {
        OutputBuffer::U8(data)
    }
}

impl DeviceSample for i16 {
    fn wrap(data: &mut [Self]) -> OutputBuffer<'_> {
        OutputBuffer::I16(data)
    }
}

impl DeviceSample for i32 {
    fn wrap(data: &mut [Self]) -> OutputBuffer<'_> {
        OutputBuffer::I32(data)
    }
}

impl DeviceSample for f32 {
    fn wrap(data: &mut [Self]) -> OutputBuffer<'_> {
        OutputBuffer::F32(data)
    }
}

fn cpal_sample_format(sample_type: SampleType) -> SampleFormat {
    match sample_type {
        SampleType::U8 => SampleFormat::U8,
        SampleType::I16 => SampleFormat::I16,
        SampleType::I32 => SampleFormat::I32,
        SampleType::F32 => SampleFormat::F32,
    }
}

/// Audio output device backed by cpal
pub struct CpalOutput {
    device: Device,
    stream: Option<Stream>,
    playing: bool,
}

impl CpalOutput {
    /// Acquire an output device.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    ///
    /// # Fallback Behavior
    /// If the named device is not found, the default device is used.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            device,
            stream: None,
            playing: false,
        })
    }

    /// Get device name.
    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Find a device configuration matching `format` exactly.
    ///
    /// Requests a fixed buffer of `block_frames` when the device allows it.
    fn stream_config(&self, format: &AudioFormat, block_frames: usize) -> Result<StreamConfig> {
        let wanted = cpal_sample_format(format.sample_type);

        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .find(|c| {
                c.channels() == format.channels
                    && c.sample_format() == wanted
                    && c.min_sample_rate().0 <= format.sample_rate
                    && c.max_sample_rate().0 >= format.sample_rate
            })
            .ok_or_else(|| {
                Error::AudioOutput(format!(
                    "Device '{}' cannot play {}",
                    self.device_name(),
                    format
                ))
            })?;

        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min as usize) <= block_frames && block_frames <= (*max as usize) =>
            {
                cpal::BufferSize::Fixed(block_frames as u32)
            }
            _ => {
                warn!(
                    "Device does not accept a fixed buffer of {} frames, using device default",
                    block_frames
                );
                cpal::BufferSize::Default
            }
        };

        Ok(StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size,
        })
    }

    fn build_stream<T: DeviceSample>(
        &self,
        config: &StreamConfig,
        mut callback: Box<dyn RenderCallback>,
        status: Arc<StreamStatus>,
    ) -> Result<Stream> {
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Stream state is tracked by the callback itself
                    let _ = callback.render(T::wrap(data));
                },
                move |err| {
                    // Device errors are fatal for the stream; no recovery attempt
                    error!("Audio stream error: {}", err);
                    status.fail(Error::AudioOutput(err.to_string()));
                },
                None, // No timeout
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl OutputDevice for CpalOutput {
    fn open(
        &mut self,
        format: &AudioFormat,
        block_frames: usize,
        callback: Box<dyn RenderCallback>,
        status: Arc<StreamStatus>,
    ) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AudioOutput("Stream already open".to_string()));
        }

        let config = self.stream_config(format, block_frames)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={}, buffer_size={:?}",
            config.sample_rate.0, config.channels, format.sample_type, config.buffer_size
        );

        let stream = match format.sample_type {
            SampleType::U8 => self.build_stream::<u8>(&config, callback, status)?,
            SampleType::I16 => self.build_stream::<i16>(&config, callback, status)?,
            SampleType::I32 => self.build_stream::<i32>(&config, callback, status)?,
            SampleType::F32 => self.build_stream::<f32>(&config, callback, status)?,
        };

        self.stream = Some(stream);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| Error::AudioOutput("Stream not open".to_string()))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.playing = true;

        info!("Audio stream started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref() {
            if self.playing {
                info!("Stopping audio stream");
                self.playing = false;
                stream
                    .pause()
                    .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
            }
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.playing && self.stream.is_some()
    }

    fn close(&mut self) {
        self.playing = false;
        if self.stream.take().is_some() {
            debug!("Audio stream closed");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.stop();
        self.close();
    }
}
