//! Audio input and output

pub mod output;
pub mod prefetch;
pub mod source;
pub mod types;

pub use output::{CallbackFlow, CpalOutput, OutputDevice, RenderCallback};
pub use prefetch::PrefetchSource;
pub use source::{FrameSource, MemorySource, SourceRead, SymphoniaSource};
pub use types::{AudioFormat, FrameBlock, OutputBuffer, SampleType};
