//! Common processor traits.
//!
//! The pipeline drives every decoder and encoder through these traits.
//! `decode`/`encode` may return zero or more outputs per input; processors
//! that queue work internally report their depth through `queue_depth` so
//! the backpressure stage can suspend the producer.

use snip_core::{AudioData, EncodedChunk, Result, VideoFrame};

/// Common trait for video decoders.
pub trait VideoDecoder: Send {
    /// Decode a chunk into frames.
    ///
    /// May return zero or more frames depending on the codec's reorder
    /// behavior. The chunk is fully consumed by this call.
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Vec<VideoFrame>>;

    /// Flush the decoder, returning any buffered frames.
    fn flush(&mut self) -> Result<Vec<VideoFrame>>;

    /// Number of inputs accepted but not yet produced as output.
    fn queue_depth(&self) -> usize {
        0
    }
}

/// Common trait for video encoders.
pub trait VideoEncoder: Send {
    /// Encode a frame into chunks.
    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedChunk>>;

    /// Flush the encoder, returning any buffered chunks.
    fn flush(&mut self) -> Result<Vec<EncodedChunk>>;

    fn queue_depth(&self) -> usize {
        0
    }

    /// Codec-specific configuration data produced during encoding
    /// (e.g. SPS/PPS for H.264), for the muxer's sample entry.
    fn codec_config(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Common trait for audio decoders.
pub trait AudioDecoder: Send {
    /// Decode a chunk into audio buffers.
    fn decode(&mut self, chunk: &EncodedChunk) -> Result<Vec<AudioData>>;

    /// Flush the decoder, returning any buffered audio.
    fn flush(&mut self) -> Result<Vec<AudioData>>;

    fn queue_depth(&self) -> usize {
        0
    }
}

/// Common trait for audio encoders.
pub trait AudioEncoder: Send {
    /// Encode audio into chunks.
    fn encode(&mut self, audio: &AudioData) -> Result<Vec<EncodedChunk>>;

    /// Flush the encoder, returning any buffered chunks.
    fn flush(&mut self) -> Result<Vec<EncodedChunk>>;

    fn queue_depth(&self) -> usize {
        0
    }

    fn codec_config(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Realtime frame capture, the fallback when bitstream decode is
/// unavailable or the platform decoder is listed broken.
///
/// A tap plays the source media and surfaces frames as they are presented,
/// so frame timing follows the presentation clock rather than the coded
/// stream. `next_frame` returns `None` once playback passes the requested
/// window.
pub trait FrameTap: Send {
    /// Pull the next presented frame, if one is available.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Stop playback and release the underlying media element. Idempotent.
    fn stop(&mut self);
}
