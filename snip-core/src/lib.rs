//! # snip-core
//!
//! Core types shared by every crate in the snip workspace:
//! - Error hierarchy and `Result` alias
//! - Microsecond time helpers and trim windows
//! - Encoded chunk, decoded frame, and audio buffer types
//! - Cooperative abort signalling

pub mod abort;
pub mod chunk;
pub mod error;
pub mod frame;
pub mod sample;
pub mod time;

pub use abort::{AbortController, AbortSignal};
pub use chunk::{ChunkKind, EncodedChunk};
pub use error::{CodecError, ContainerError, Error, Result};
pub use frame::{PixelFormat, VideoFrame};
pub use sample::AudioData;
pub use time::{ticks_to_us, us_to_ticks, TimeRange, MICROS_PER_SEC};
