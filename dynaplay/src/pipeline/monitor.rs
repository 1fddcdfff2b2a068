//! Render callback health monitor
//!
//! Counts what happens on the real-time render path so the controlling
//! thread can log it.
//!
//! **Design:** the callback only increments atomics (no logging, no locks);
//! `HealthReporter` turns counter deltas into log lines from the controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Lock-free counters updated by the render callback
#[derive(Debug, Default)]
pub struct CallbackMonitor {
    callback_count: AtomicU64,
    frames_delivered: AtomicU64,
    blocks_processed: AtomicU64,
    underrun_count: AtomicU64,
    deadline_misses: AtomicU64,
    max_render_ns: AtomicU64,
}

impl CallbackMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a callback invocation (call at the start of the callback)
    ///
    /// **REAL-TIME SAFE**: atomic operations only
    pub fn record_callback(&self) {
        self.callback_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one block handed to the engine and written to the device
    ///
    /// **REAL-TIME SAFE**: atomic operations only
    pub fn record_block(&self, frames: usize) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Record a short, non-final read padded with silence
    ///
    /// **REAL-TIME SAFE**: atomic operations only
    pub fn record_underrun(&self) {
        self.underrun_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long one invocation took against its deadline
    ///
    /// **REAL-TIME SAFE**: atomic operations only
    pub fn record_render_time(&self, elapsed: Duration, deadline: Duration) {
        let elapsed_ns = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.max_render_ns.fetch_max(elapsed_ns, Ordering::Relaxed);
        if elapsed > deadline {
            self.deadline_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> CallbackStats {
        CallbackStats {
            callback_count: self.callback_count.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            underrun_count: self.underrun_count.load(Ordering::Relaxed),
            deadline_misses: self.deadline_misses.load(Ordering::Relaxed),
            max_render_time: Duration::from_nanos(self.max_render_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Callback statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackStats {
    pub callback_count: u64,
    /// Processed (non-silence) frames written to the device
    pub frames_delivered: u64,
    pub blocks_processed: u64,
    pub underrun_count: u64,
    pub deadline_misses: u64,
    pub max_render_time: Duration,
}

/// Logs new underruns and deadline misses since the previous report
#[derive(Debug, Default)]
pub struct HealthReporter {
    last: CallbackStats,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `stats` with the previous snapshot and log changes
    pub fn report(&mut self, stats: CallbackStats) {
        if stats.underrun_count > self.last.underrun_count {
            warn!(
                "Render underrun: {} total (+{} since last check)",
                stats.underrun_count,
                stats.underrun_count - self.last.underrun_count
            );
        }

        if stats.deadline_misses > self.last.deadline_misses {
            warn!(
                "Render deadline missed: {} total (+{} since last check), worst {:.2}ms",
                stats.deadline_misses,
                stats.deadline_misses - self.last.deadline_misses,
                stats.max_render_time.as_secs_f64() * 1000.0
            );
        }

        debug!(
            "Render health: {} callbacks, {} blocks, {} frames, {} underruns",
            stats.callback_count, stats.blocks_processed, stats.frames_delivered, stats.underrun_count
        );

        self.last = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let monitor = CallbackMonitor::new();
        monitor.record_callback();
        monitor.record_callback();
        monitor.record_block(1024);
        monitor.record_block(200);
        monitor.record_underrun();

        let stats = monitor.stats();
        assert_eq!(stats.callback_count, 2);
        assert_eq!(stats.blocks_processed, 2);
        assert_eq!(stats.frames_delivered, 1224);
        assert_eq!(stats.underrun_count, 1);
    }

    #[test]
    fn test_deadline_tracking() {
        let monitor = CallbackMonitor::new();
        let deadline = Duration::from_millis(23);

        monitor.record_render_time(Duration::from_millis(1), deadline);
        monitor.record_render_time(Duration::from_millis(30), deadline);
        monitor.record_render_time(Duration::from_millis(2), deadline);

        let stats = monitor.stats();
        assert_eq!(stats.deadline_misses, 1);
        assert_eq!(stats.max_render_time, Duration::from_millis(30));
    }

    #[test]
    fn test_reporter_tracks_last_snapshot() {
        let monitor = CallbackMonitor::new();
        let mut reporter = HealthReporter::new();

        monitor.record_underrun();
        reporter.report(monitor.stats());
        assert_eq!(reporter.last.underrun_count, 1);
    }
}
