//! Container formats for the snip trim pipeline.
//!
//! MP4 (ISO BMFF) input and output, WebM output. Input probing is by
//! file signature; see [`probe`].

pub mod mp4;
pub mod traits;
pub mod webm;

pub use traits::{
    probe, CodecId, ContainerFormat, Muxer, Rotation, TrackKind, TrackMetadata, VideoTrackMetadata,
    AudioTrackMetadata,
};
