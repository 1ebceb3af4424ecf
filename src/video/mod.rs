//! Video output.
//!
//! Provides:
//! - [`FrameSink`] implementations: an `ffmpeg` process encoder, an
//!   in-memory sink, a threaded wrapper and, with the `native-encoder`
//!   feature, an in-process rsmpeg encoder
//! - [`VideoAssembly`] for attaching the source audio
//! - Collision-free output naming

pub mod assembly;
pub mod encoder;
#[cfg(feature = "native-encoder")]
pub mod native;
pub mod output;

pub use assembly::{MuxError, VideoAssembly};
pub use encoder::{FfmpegProcessEncoder, FrameSink, MemorySink, ThreadedSink, VideoConfig, VideoError};
#[cfg(feature = "native-encoder")]
pub use native::NativeEncoder;
pub use output::derive_output_path;
