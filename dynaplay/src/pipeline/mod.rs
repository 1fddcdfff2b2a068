//! Real-time streaming pipeline
//!
//! Block reader → processing adapter → streaming scheduler. The scheduler
//! owns the other two and is the only piece the output device sees.

pub mod adapter;
pub mod block_reader;
pub mod monitor;
pub mod scheduler;
pub mod state;

pub use adapter::ProcessingAdapter;
pub use block_reader::BlockReader;
pub use monitor::{CallbackMonitor, CallbackStats, HealthReporter};
pub use scheduler::StreamingScheduler;
pub use state::{StreamState, StreamStatus, WaitOutcome};
