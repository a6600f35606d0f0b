//! # snip-codecs
//!
//! Decode/encode capability layer for the snip trim pipeline.
//!
//! This crate implements no codecs of its own. It defines:
//!
//! - [`VideoDecoder`] / [`VideoEncoder`] / [`AudioDecoder`] / [`AudioEncoder`] -
//!   the processor traits the pipeline drives
//! - [`FrameTap`] - realtime frame capture used when bitstream decode is
//!   unavailable
//! - [`CodecProvider`] - the registry the caller supplies, with queryable
//!   support checks per configuration
//! - [`PlatformCapabilities`] - injected capability table (broken-decoder
//!   list, hardware flags, dimension caps) so fallback selection is
//!   deterministic under test

pub mod capabilities;
pub mod config;
pub mod provider;
pub mod traits;

pub use capabilities::PlatformCapabilities;
pub use config::{
    AudioDecoderConfig, AudioEncoderConfig, HardwarePreference, LatencyMode, VideoDecoderConfig,
    VideoEncoderConfig,
};
pub use provider::CodecProvider;
pub use traits::{AudioDecoder, AudioEncoder, FrameTap, VideoDecoder, VideoEncoder};
