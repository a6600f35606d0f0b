//! # snip
//!
//! Media trim/transcode pipeline: take an MP4/MOV source, extract a time
//! sub-range, and produce a new container file. Video is decoded and
//! re-encoded (correcting rotation and honoring frame-granular bounds);
//! audio copies through coded when the output container allows it.
//!
//! Codecs themselves are externally supplied through
//! [`CodecProvider`]; this library orchestrates them.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use snip::{trim, Source, TrimOptions, TrimOutcome};
//!
//! fn main() -> snip::Result<()> {
//!     # let provider: Box<dyn snip::CodecProvider> = unimplemented!();
//!     let options = TrimOptions::new(2.0, 6.0)
//!         .on_progress(Box::new(|fraction| eprintln!("{:.0}%", fraction * 100.0)));
//!
//!     match trim(Source::path("clip.mp4"), provider.as_ref(), options)? {
//!         TrimOutcome::Finished(output) => std::fs::write("out.webm", output.data)?,
//!         TrimOutcome::Stopped => eprintln!("aborted"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - `snip-core`: shared types (chunks, frames, audio, errors, abort)
//! - `snip-containers`: MP4 demuxing, MP4/WebM muxing
//! - `snip-codecs`: codec capability traits, configs, provider registry
//! - `snip-pipeline`: backpressure stages, extraction, reorder, muxing glue
//!
//! This crate holds the public `trim()` entry point and re-exports the
//! commonly used types.

mod options;
mod source;
mod trim;

pub use options::{CredentialsMode, TrimOptions};
pub use source::Source;
pub use trim::{trim, TrimOutcome, TrimOutput};

pub use snip_core::{
    AbortController, AbortSignal, AudioData, ChunkKind, CodecError, ContainerError, EncodedChunk,
    Error, PixelFormat, Result, TimeRange, VideoFrame,
};

pub use snip_codecs::{
    AudioDecoder, AudioDecoderConfig, AudioEncoder, AudioEncoderConfig, CodecProvider, FrameTap,
    HardwarePreference, LatencyMode, PlatformCapabilities, VideoDecoder, VideoDecoderConfig,
    VideoEncoder, VideoEncoderConfig,
};

pub use snip_containers::{
    mp4::{Mp4Demuxer, Mp4Muxer},
    webm::WebmMuxer,
    AudioTrackMetadata, CodecId, ContainerFormat, Muxer, Rotation, TrackMetadata,
    VideoTrackMetadata,
};

pub use snip_pipeline::ProgressCallback;
