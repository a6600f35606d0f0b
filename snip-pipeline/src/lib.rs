//! # snip-pipeline
//!
//! The stage machinery between the demuxer and the muxer:
//!
//! - [`CodecTransform`] - the single backpressure primitive every
//!   decode/encode stage specializes
//! - [`DecodeExtractor`] / [`CaptureExtractor`] - raw-frame extraction with
//!   window clipping and rotation correction
//! - [`VideoEncodeStage`] / [`AudioEncodeStage`] - encode stages; video
//!   additionally reorders out-of-order encoder output
//! - [`MuxerAdapter`] - zero-anchor timestamp rebase over a container muxer
//! - [`ProgressSink`] - merged, throttled, monotonic progress reporting
//!
//! All stages are non-blocking with explicit suspension points; the
//! orchestrator cooperatively round-robins them on one thread.

pub mod encode;
pub mod extract;
pub mod mux;
pub mod progress;
pub mod reorder;
pub mod rotate;
pub mod stage;

pub use encode::{AudioEncodeStage, VideoEncodeStage};
pub use extract::{select_extractor, CaptureExtractor, DecodeExtractor, FrameExtractor};
pub use mux::MuxerAdapter;
pub use progress::{ProgressCallback, ProgressSink};
pub use reorder::GapAwareReorder;
pub use rotate::RotationScratch;
pub use stage::{CodecTransform, CodedProcessor, PushOutcome, HIGH_WATERMARK};
