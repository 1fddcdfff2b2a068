//! Decode-ahead worker feeding a lock-free ring buffer
//!
//! File decoding does I/O and allocates, so it cannot run on the audio
//! callback. `PrefetchSource` moves the wrapped source onto a worker thread
//! that keeps a single-producer single-consumer ring topped up; the callback
//! side only pops bytes.
//!
//! Design:
//! - Producer (decode worker): reads frames from the inner source, pushes bytes
//! - Consumer (audio callback): pops whole frames without locks
//! - Worker failure is parked in a mutex that the consumer inspects only after
//!   the `failed` flag is set and the buffered audio is used up

use crate::audio::source::{FrameSource, SourceRead};
use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Worker sleep when the ring is full
const FULL_BACKOFF: Duration = Duration::from_millis(2);

/// Frames decoded per worker iteration
const WORKER_CHUNK_FRAMES: usize = 1024;

/// State shared between the worker and the consumer
struct Shared {
    /// Inner source returned all of its frames
    finished: AtomicBool,
    /// Inner source failed; error waits in `failure`
    failed: AtomicBool,
    failure: Mutex<Option<Error>>,
    /// Consumer dropped; worker exits
    shutdown: AtomicBool,
}

/// Frame source served from a ring buffer filled by a decode worker
pub struct PrefetchSource {
    format: AudioFormat,
    consumer: HeapCons<u8>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    ready_rx: Option<mpsc::Receiver<()>>,
}

impl PrefetchSource {
    /// Start a decode worker for `inner` with room for `capacity_frames`.
    ///
    /// The worker signals readiness once the ring is half full or the source
    /// is finished; see [`PrefetchSource::wait_ready`].
    pub fn spawn(inner: Box<dyn FrameSource>, capacity_frames: usize) -> Result<Self> {
        let format = inner.format();
        let bpf = format.bytes_per_frame();
        let capacity_frames = capacity_frames.max(WORKER_CHUNK_FRAMES);

        debug!(
            "Creating prefetch ring: {} frames ({} bytes)",
            capacity_frames,
            capacity_frames * bpf
        );

        let (producer, consumer) = HeapRb::<u8>::new(capacity_frames * bpf).split();
        let shared = Arc::new(Shared {
            finished: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        });
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("decode-worker".to_string())
            .spawn(move || {
                run_worker(inner, producer, worker_shared, ready_tx, capacity_frames / 2)
            })?;

        Ok(Self {
            format,
            consumer,
            shared,
            worker: Some(worker),
            ready_rx: Some(ready_rx),
        })
    }

    /// Block until the initial prefill is done or `timeout` elapses.
    ///
    /// Returns false on timeout; streaming may still start, at the cost of
    /// early underruns.
    pub fn wait_ready(&mut self, timeout: Duration) -> bool {
        match self.ready_rx.take() {
            Some(rx) => match rx.recv_timeout(timeout) {
                Ok(()) => true,
                // Worker exited before signalling (failure path still counts as ready)
                Err(mpsc::RecvTimeoutError::Disconnected) => true,
                Err(mpsc::RecvTimeoutError::Timeout) => false,
            },
            None => true,
        }
    }

    /// Frames currently buffered
    pub fn buffered_frames(&self) -> usize {
        self.consumer.occupied_len() / self.format.bytes_per_frame()
    }
}

impl FrameSource for PrefetchSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    /// Pop whole frames without blocking.
    ///
    /// **REAL-TIME SAFE** on the data path: atomics and ring pops only. The
    /// failure mutex is locked once, when the stream is already failing.
    fn read_frames(&mut self, dst: &mut [u8]) -> Result<SourceRead> {
        let bpf = self.format.bytes_per_frame();

        // Read flags before popping: data pushed before `finished` is visible
        let finished = self.shared.finished.load(Ordering::Acquire);
        let failed = self.shared.failed.load(Ordering::Acquire);

        let whole = (self.consumer.occupied_len() / bpf).min(dst.len() / bpf) * bpf;
        let popped = self.consumer.pop_slice(&mut dst[..whole]);
        let drained = self.consumer.occupied_len() < bpf;

        if failed && popped == 0 && drained {
            let failure = self
                .shared
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            return Err(failure
                .unwrap_or_else(|| Error::DecodeFailure("decode worker failed".to_string())));
        }

        Ok(SourceRead {
            frames: popped / bpf,
            exhausted: finished && drained,
        })
    }
}

impl Drop for PrefetchSource {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Decode worker panicked");
            }
        }
    }
}

fn run_worker(
    mut inner: Box<dyn FrameSource>,
    mut producer: HeapProd<u8>,
    shared: Arc<Shared>,
    ready_tx: mpsc::SyncSender<()>,
    ready_threshold_frames: usize,
) {
    let bpf = inner.format().bytes_per_frame();
    let mut chunk = vec![0u8; WORKER_CHUNK_FRAMES * bpf];
    let mut ready_tx = Some(ready_tx);

    debug!("Decode worker started");

    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            debug!("Decode worker stopping on shutdown");
            return;
        }

        let read = match inner.read_frames(&mut chunk) {
            Ok(read) => read,
            Err(e) => {
                warn!("Decode worker failed: {}", e);
                *shared
                    .failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(e);
                shared.failed.store(true, Ordering::Release);
                signal_ready(&mut ready_tx);
                return;
            }
        };

        let bytes = &chunk[..read.frames * bpf];
        let mut pushed = 0;
        while pushed < bytes.len() {
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            let n = producer.push_slice(&bytes[pushed..]);
            pushed += n;
            if n == 0 {
                signal_ready(&mut ready_tx);
                std::thread::sleep(FULL_BACKOFF);
            }
        }

        if producer.occupied_len() / bpf >= ready_threshold_frames {
            signal_ready(&mut ready_tx);
        }

        if read.exhausted {
            shared.finished.store(true, Ordering::Release);
            signal_ready(&mut ready_tx);
            debug!("Decode worker reached end of stream");
            return;
        }

        if read.frames == 0 {
            // Inner source had nothing yet
            std::thread::sleep(FULL_BACKOFF);
        }
    }
}

/// Signal readiness once; later calls are no-ops
fn signal_ready(tx: &mut Option<mpsc::SyncSender<()>>) {
    if let Some(tx) = tx.take() {
        let _ = tx.try_send(());
    }
}
