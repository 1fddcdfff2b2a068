//! Lifecycle controller
//!
//! Owns one stream from start to finish: verifies the engine, builds the
//! pipeline, arms the output device, waits for the stream to end or for an
//! interrupt, and releases everything in reverse acquisition order.
//!
//! # Outcomes
//! - `Err(_)` from [`LifecycleController::run`]: the stream could not start
//!   and nothing was heard.
//! - [`StreamOutcome::Failed`]: the stream started and stopped partway.

use crate::audio::output::OutputDevice;
use crate::audio::source::FrameSource;
use crate::engine::{verify_engine, CompressorParameters, DynamicsEngine};
use crate::error::{Error, Result};
use crate::pipeline::{
    BlockReader, CallbackMonitor, CallbackStats, HealthReporter, ProcessingAdapter, StreamState,
    StreamStatus, StreamingScheduler, WaitOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default frames per processing block
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// Stream settings fixed before the device is armed
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Block capacity in frames; also the requested device buffer size
    pub block_frames: usize,
    pub params: CompressorParameters,
    /// Time to let queued output play after completion
    /// (None = two block durations)
    pub drain: Option<Duration>,
    /// How often to log callback health while streaming
    pub report_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            params: CompressorParameters::default(),
            drain: None,
            report_interval: Duration::from_secs(5),
        }
    }
}

/// How a started stream ended
#[derive(Debug)]
pub enum StreamOutcome {
    /// Source played to the end
    Completed,
    /// Stopped on external request
    Interrupted,
    /// Aborted partway
    Failed(Error),
}

/// Summary returned once a stream has ended
#[derive(Debug)]
pub struct StreamReport {
    pub outcome: StreamOutcome,
    pub stats: CallbackStats,
    /// Wall time from device start to release
    pub elapsed: Duration,
}

/// Stops and closes the device when dropped, including on early return
struct DeviceGuard<'a, D: OutputDevice> {
    device: &'a mut D,
    opened: bool,
}

impl<'a, D: OutputDevice> DeviceGuard<'a, D> {
    fn new(device: &'a mut D) -> Self {
        Self {
            device,
            opened: false,
        }
    }
}

impl<D: OutputDevice> Drop for DeviceGuard<'_, D> {
    fn drop(&mut self) {
        if !self.opened {
            return;
        }
        if let Err(e) = self.device.stop() {
            warn!("Failed to stop output device: {}", e);
        }
        // Drops the scheduler, and with it the reader and source
        self.device.close();
        debug!("Output device released");
    }
}

/// Runs one stream on an output device
pub struct LifecycleController<D: OutputDevice> {
    device: D,
    settings: StreamSettings,
    status: Arc<StreamStatus>,
    monitor: Arc<CallbackMonitor>,
}

impl<D: OutputDevice> LifecycleController<D> {
    /// Create a controller. `status` is shared with whoever may interrupt
    /// the stream; it must be fresh (Idle).
    pub fn new(device: D, settings: StreamSettings, status: Arc<StreamStatus>) -> Self {
        Self {
            device,
            settings,
            status,
            monitor: Arc::new(CallbackMonitor::new()),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Stream `source` through `engine` to the device until it ends.
    ///
    /// Blocks the calling thread. Load-time failures are returned before
    /// the device is opened.
    pub fn run(
        &mut self,
        source: Box<dyn FrameSource>,
        mut engine: Box<dyn DynamicsEngine>,
    ) -> Result<StreamReport> {
        if self.status.state() != StreamState::Idle {
            return Err(Error::ContractViolation(format!(
                "stream status is {:?}; a controller status serves one stream",
                self.status.state()
            )));
        }

        let format = source.format();
        format.validate().map_err(|e| Error::SourceUnavailable {
            path: PathBuf::from("-"),
            reason: e.to_string(),
        })?;

        let block_frames = self.settings.block_frames;
        if block_frames == 0 {
            return Err(Error::Config("block_frames must be greater than zero".to_string()));
        }

        // Engine check happens before any device resource is acquired
        verify_engine(engine.as_mut(), &format, &self.settings.params)?;

        let adapter = ProcessingAdapter::new(engine, format, self.settings.params);
        let params = adapter.params();
        info!(
            "Stream format: {}, block {} frames, engine '{}' (threshold {}, ratio {}, attack {}s, release {}s)",
            format,
            block_frames,
            adapter.engine_name(),
            params.threshold,
            params.ratio,
            params.attack_secs,
            params.release_secs
        );
        let reader = BlockReader::new(source, block_frames);
        let mut scheduler = StreamingScheduler::new(
            reader,
            adapter,
            Arc::clone(&self.status),
            Arc::clone(&self.monitor),
        )?;
        scheduler.arm();

        if self.status.is_interrupted() {
            info!("Interrupted before the device was started");
            return Ok(StreamReport {
                outcome: StreamOutcome::Interrupted,
                stats: self.monitor.stats(),
                elapsed: Duration::ZERO,
            });
        }

        let started = Instant::now();
        let mut guard = DeviceGuard::new(&mut self.device);
        guard.device.open(
            &format,
            block_frames,
            Box::new(scheduler),
            Arc::clone(&self.status),
        )?;
        guard.opened = true;
        guard.device.start()?;
        self.status.activate();
        info!("Streaming started");

        let outcome = wait_for_end(&self.status, &self.monitor, self.settings.report_interval);

        if matches!(outcome, StreamOutcome::Completed) {
            let drain = self
                .settings
                .drain
                .unwrap_or_else(|| format.frames_to_duration(block_frames) * 2);
            debug!("Draining output for {:?}", drain);
            std::thread::sleep(drain);
        }

        drop(guard);

        let stats = self.monitor.stats();
        match &outcome {
            StreamOutcome::Completed => info!(
                "Stream completed: {} frames in {} blocks, {} underruns",
                stats.frames_delivered, stats.blocks_processed, stats.underrun_count
            ),
            StreamOutcome::Interrupted => info!(
                "Stream interrupted after {} frames",
                stats.frames_delivered
            ),
            StreamOutcome::Failed(e) => error!(
                "Stream failed after {} frames: {}",
                stats.frames_delivered, e
            ),
        }

        Ok(StreamReport {
            outcome,
            stats,
            elapsed: started.elapsed(),
        })
    }
}

/// Block until the stream ends or is interrupted, logging health on each
/// timeout
fn wait_for_end(
    status: &StreamStatus,
    monitor: &CallbackMonitor,
    report_interval: Duration,
) -> StreamOutcome {
    let mut reporter = HealthReporter::new();

    let outcome = loop {
        match status.wait(report_interval) {
            WaitOutcome::Finished(StreamState::Completed) => break StreamOutcome::Completed,
            WaitOutcome::Finished(_) => {
                let failure = status
                    .take_failure()
                    .unwrap_or_else(|| Error::AudioOutput("stream failed".to_string()));
                break StreamOutcome::Failed(failure);
            }
            WaitOutcome::Interrupted => break StreamOutcome::Interrupted,
            WaitOutcome::TimedOut => reporter.report(monitor.stats()),
        }
    };

    reporter.report(monitor.stats());
    outcome
}
