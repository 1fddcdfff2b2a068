//! Stream lifecycle state shared between the render callback and the
//! controlling thread
//!
//! The callback touches the mutex only on its single terminal transition;
//! the controller blocks on the condition variable instead of polling.

use crate::error::Error;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Lifecycle of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, device not yet started
    Idle,
    /// Device running, audio flowing
    Active,
    /// Source exhausted (terminal)
    Completed,
    /// Stream aborted on an error (terminal)
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}

/// Why a `wait` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Stream reached a terminal state
    Finished(StreamState),
    /// External interrupt requested
    Interrupted,
    /// Timeout elapsed with the stream still running
    TimedOut,
}

struct Inner {
    state: StreamState,
    failure: Option<Error>,
    interrupted: bool,
}

/// Shared stream status with a wake-up for state changes
pub struct StreamStatus {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl StreamStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: StreamState::Idle,
                failure: None,
                interrupted: false,
            }),
            changed: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> StreamState {
        self.lock().state
    }

    /// Idle → Active; ignored in any other state
    pub fn activate(&self) {
        let mut inner = self.lock();
        if inner.state == StreamState::Idle {
            inner.state = StreamState::Active;
            self.changed.notify_all();
        }
    }

    /// Mark the stream completed unless it already ended
    pub fn complete(&self) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = StreamState::Completed;
            self.changed.notify_all();
        }
    }

    /// Mark the stream failed; the first failure wins
    pub fn fail(&self, error: Error) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = StreamState::Failed;
            inner.failure = Some(error);
            self.changed.notify_all();
        }
    }

    /// Request an orderly stop from outside the stream
    pub fn interrupt(&self) {
        let mut inner = self.lock();
        inner.interrupted = true;
        self.changed.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    /// Block until the stream ends, an interrupt arrives, or `timeout`
    /// elapses. A terminal state takes precedence over an interrupt.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let guard = self.lock();
        let (inner, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |inner| {
                !inner.state.is_terminal() && !inner.interrupted
            })
            .unwrap_or_else(PoisonError::into_inner);

        if inner.state.is_terminal() {
            WaitOutcome::Finished(inner.state)
        } else if inner.interrupted {
            WaitOutcome::Interrupted
        } else {
            WaitOutcome::TimedOut
        }
    }

    /// Take the error that failed the stream, if any
    pub fn take_failure(&self) -> Option<Error> {
        self.lock().failure.take()
    }
}
