//! Streaming scheduler
//!
//! The render callback registered with the output device. Each invocation
//! pulls blocks from the block reader, runs them through the processing
//! adapter and writes the result into the device buffer, padding any
//! shortfall with silence.
//!
//! **REAL-TIME SAFE:** the block and the f32 scratch buffer are allocated
//! once in `new`. The shared status mutex is locked only on the single
//! terminal transition.

use crate::audio::output::{CallbackFlow, RenderCallback};
use crate::audio::types::{AudioFormat, FrameBlock, OutputBuffer};
use crate::error::{Error, Result};
use crate::pipeline::adapter::ProcessingAdapter;
use crate::pipeline::block_reader::BlockReader;
use crate::pipeline::monitor::CallbackMonitor;
use crate::pipeline::state::{StreamState, StreamStatus};
use std::sync::Arc;
use std::time::Instant;

pub struct StreamingScheduler {
    reader: BlockReader,
    adapter: ProcessingAdapter,
    status: Arc<StreamStatus>,
    monitor: Arc<CallbackMonitor>,
    format: AudioFormat,
    block: FrameBlock,
    scratch: Vec<f32>,
    /// Local copy of the stream state; avoids the status lock per callback
    state: StreamState,
}

impl StreamingScheduler {
    /// Build a scheduler; reader and adapter must agree on the format
    pub fn new(
        reader: BlockReader,
        adapter: ProcessingAdapter,
        status: Arc<StreamStatus>,
        monitor: Arc<CallbackMonitor>,
    ) -> Result<Self> {
        let format = reader.format();
        if *adapter.format() != format {
            return Err(Error::ContractViolation(format!(
                "adapter format {} does not match source format {}",
                adapter.format(),
                format
            )));
        }

        let capacity = reader.capacity_frames();
        if capacity == 0 {
            return Err(Error::ContractViolation(
                "block capacity must be at least one frame".to_string(),
            ));
        }

        Ok(Self {
            reader,
            adapter,
            status,
            monitor,
            format,
            block: FrameBlock::with_capacity(format, capacity),
            scratch: vec![0.0; capacity * format.channels as usize],
            state: StreamState::Idle,
        })
    }

    /// Idle → Active. Until armed, the scheduler renders silence.
    pub fn arm(&mut self) {
        if self.state == StreamState::Idle {
            self.state = StreamState::Active;
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn abort(&mut self, out: &mut OutputBuffer<'_>, error: Error) -> CallbackFlow {
        // No partial audio from a failing invocation
        out.fill_silence(0);
        self.state = StreamState::Failed;
        self.status.fail(error);
        CallbackFlow::Abort
    }

    /// Fill `out` from the pipeline; `requested` frames, at least one
    fn fill(&mut self, out: &mut OutputBuffer<'_>, requested: usize) -> Result<CallbackFlow> {
        let channels = self.format.channels as usize;
        let capacity = self.block.capacity_frames();
        let mut written = 0;

        while written < requested {
            let chunk = (requested - written).min(capacity);
            let is_final = self.reader.next_block(&mut self.block, chunk)?;
            let frames = self.block.frame_count();

            if frames > 0 {
                let samples = self.adapter.process(&self.block, &mut self.scratch)?;
                out.write_f32(written * channels, &self.scratch[..samples]);
                written += frames;
                self.monitor.record_block(frames);
            }

            if is_final {
                if written == 0 {
                    // End of stream with nothing left to play
                    out.fill_silence(0);
                    self.state = StreamState::Completed;
                    self.status.complete();
                    return Ok(CallbackFlow::Complete);
                }
                // Completion is reported on the next invocation
                break;
            }

            if frames < chunk {
                // Source could not keep up
                self.monitor.record_underrun();
                break;
            }
        }

        out.fill_silence(written * channels);
        Ok(CallbackFlow::Continue)
    }
}

impl RenderCallback for StreamingScheduler {
    fn render(&mut self, mut out: OutputBuffer<'_>) -> CallbackFlow {
        self.monitor.record_callback();

        match self.state {
            StreamState::Idle => {
                out.fill_silence(0);
                return CallbackFlow::Continue;
            }
            StreamState::Completed => {
                out.fill_silence(0);
                return CallbackFlow::Complete;
            }
            StreamState::Failed => {
                out.fill_silence(0);
                return CallbackFlow::Abort;
            }
            StreamState::Active => {}
        }

        if out.sample_type() != self.format.sample_type {
            let error = Error::ContractViolation(format!(
                "device buffer is {} but the stream is {}",
                out.sample_type(),
                self.format.sample_type
            ));
            return self.abort(&mut out, error);
        }

        let channels = self.format.channels as usize;
        if out.len() % channels != 0 {
            let error = Error::ContractViolation(format!(
                "device buffer of {} samples is not a whole number of {}-channel frames",
                out.len(),
                channels
            ));
            return self.abort(&mut out, error);
        }

        let requested = out.len() / channels;
        if requested == 0 {
            return CallbackFlow::Continue;
        }

        let started = Instant::now();
        match self.fill(&mut out, requested) {
            Ok(flow) => {
                self.monitor
                    .record_render_time(started.elapsed(), self.format.frames_to_duration(requested));
                flow
            }
            Err(error) => self.abort(&mut out, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MemorySource;
    use crate::audio::types::SampleType;
    use crate::engine::{CompressorParameters, DynamicsEngine};

    struct PassThrough;

    impl DynamicsEngine for PassThrough {
        fn name(&self) -> &str {
            "pass"
        }

        fn process_buffer(&mut self, _: &mut [f32], _: usize, _: f32, _: f32, _: f32, _: f32) {}
    }

    fn scheduler_for(samples: &[i16], capacity: usize) -> (StreamingScheduler, Arc<StreamStatus>) {
        let format = AudioFormat::new(8000, 1, SampleType::I16);
        let source = MemorySource::from_samples(format, samples);
        let reader = BlockReader::new(Box::new(source), capacity);
        let adapter =
            ProcessingAdapter::new(Box::new(PassThrough), format, CompressorParameters::default());
        let status = StreamStatus::new();
        let scheduler = StreamingScheduler::new(
            reader,
            adapter,
            Arc::clone(&status),
            Arc::new(CallbackMonitor::new()),
        )
        .unwrap();
        (scheduler, status)
    }

    #[test]
    fn test_unarmed_renders_silence() {
        let (mut scheduler, _) = scheduler_for(&[1000; 8], 8);
        let mut buf = [7i16; 8];

        assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Continue);
        assert_eq!(buf, [0; 8]);
        assert_eq!(scheduler.state(), StreamState::Idle);
    }

    #[test]
    fn test_request_larger_than_capacity_is_chunked() {
        let samples: Vec<i16> = (1..=10).collect();
        let (mut scheduler, _) = scheduler_for(&samples, 4);
        scheduler.arm();

        let mut buf = [0i16; 12];
        assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Continue);
        assert_eq!(&buf[..10], &samples[..]);
        assert_eq!(&buf[10..], &[0, 0]);

        assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Complete);
        assert_eq!(scheduler.state(), StreamState::Completed);
    }

    #[test]
    fn test_sample_type_mismatch_aborts() {
        let (mut scheduler, status) = scheduler_for(&[1000; 8], 8);
        scheduler.arm();

        let mut buf = [0.5f32; 8];
        assert_eq!(scheduler.render(OutputBuffer::F32(&mut buf)), CallbackFlow::Abort);
        assert_eq!(buf, [0.0; 8]);
        assert_eq!(status.state(), StreamState::Failed);
        assert!(matches!(status.take_failure(), Some(Error::ContractViolation(_))));
    }

    #[test]
    fn test_zero_frame_request_is_noop() {
        let (mut scheduler, status) = scheduler_for(&[1000; 8], 8);
        scheduler.arm();

        let mut buf: [i16; 0] = [];
        assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Continue);
        assert_eq!(scheduler.state(), StreamState::Active);
        assert_eq!(status.state(), StreamState::Idle);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let (mut scheduler, _) = scheduler_for(&[], 8);
        scheduler.arm();

        let mut buf = [5i16; 8];
        assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Complete);
        for _ in 0..3 {
            buf = [5; 8];
            assert_eq!(scheduler.render(OutputBuffer::I16(&mut buf)), CallbackFlow::Complete);
            assert_eq!(buf, [0; 8]);
        }
    }
}
