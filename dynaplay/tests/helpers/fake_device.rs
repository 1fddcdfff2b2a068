//! Fake output device
//!
//! Invokes the registered render callback from its own thread with fixed
//! size i16 buffers and records everything it was handed. Stops invoking
//! once the callback returns `Complete` or `Abort`.

use dynaplay::audio::{AudioFormat, CallbackFlow, OutputBuffer, OutputDevice, RenderCallback, SampleType};
use dynaplay::pipeline::StreamStatus;
use dynaplay::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Open,
    Start,
    Stop,
    Close,
}

/// Everything the fake device observed
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub events: Vec<DeviceEvent>,
    /// Concatenated output of every callback
    pub output: Vec<i16>,
    pub flows: Vec<CallbackFlow>,
    /// Invocations started; equals `flows.len()` when none was cut short
    pub invocations_started: usize,
}

pub struct FakeDevice {
    log: Arc<Mutex<DeviceLog>>,
    period_frames: usize,
    pace: Duration,
    format: Option<AudioFormat>,
    callback: Option<Box<dyn RenderCallback>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Box<dyn RenderCallback>>>,
}

impl FakeDevice {
    /// Device requesting `period_frames` frames per callback, pausing
    /// `pace` between callbacks
    pub fn new(period_frames: usize, pace: Duration) -> Self {
        Self {
            log: Arc::new(Mutex::new(DeviceLog::default())),
            period_frames,
            pace,
            format: None,
            callback: None,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn log(&self) -> Arc<Mutex<DeviceLog>> {
        Arc::clone(&self.log)
    }

    fn record(&self, event: DeviceEvent) {
        self.log.lock().unwrap().events.push(event);
    }
}

impl OutputDevice for FakeDevice {
    fn open(
        &mut self,
        format: &AudioFormat,
        _block_frames: usize,
        callback: Box<dyn RenderCallback>,
        _status: Arc<StreamStatus>,
    ) -> Result<()> {
        if format.sample_type != SampleType::I16 {
            return Err(Error::AudioOutput(format!("fake device cannot play {}", format)));
        }
        self.format = Some(*format);
        self.callback = Some(callback);
        self.record(DeviceEvent::Open);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut callback = self
            .callback
            .take()
            .ok_or_else(|| Error::AudioOutput("not open".to_string()))?;
        let channels = self.format.map(|f| f.channels as usize).unwrap_or(1);
        let len = self.period_frames * channels;
        let pace = self.pace;
        let log = Arc::clone(&self.log);
        let running = Arc::clone(&self.running);

        running.store(true, Ordering::SeqCst);
        self.record(DeviceEvent::Start);

        self.thread = Some(std::thread::spawn(move || {
            let mut done = false;
            while running.load(Ordering::SeqCst) {
                if !done {
                    let mut buf = vec![0i16; len];
                    log.lock().unwrap().invocations_started += 1;
                    let flow = callback.render(OutputBuffer::I16(&mut buf));
                    let mut log = log.lock().unwrap();
                    log.output.extend_from_slice(&buf);
                    log.flows.push(flow);
                    done = flow != CallbackFlow::Continue;
                }
                std::thread::sleep(pace);
            }
            callback
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            // The in-flight invocation finishes before the thread returns
            let callback = thread
                .join()
                .map_err(|_| Error::AudioOutput("callback thread panicked".to_string()))?;
            self.callback = Some(callback);
            self.record(DeviceEvent::Stop);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.thread.is_some()
    }

    fn close(&mut self) {
        self.callback = None;
        self.record(DeviceEvent::Close);
    }
}
