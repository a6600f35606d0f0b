//! WebM container support (output only).

mod ebml;
mod elements;
mod muxer;

pub use muxer::WebmMuxer;
