//! Timestamp-rebasing adapter over a container muxer.
//!
//! Each codec maps to a different token per target container (MP4 fourccs
//! vs WebM codec ID strings); the concrete muxers own that mapping and
//! reject codecs they cannot carry, so track registration surfaces an
//! unsupported combination before any chunk is written. The adapter's own
//! job is the zero anchor: the first chunk's timestamp per track becomes
//! that track's origin and every later chunk is written at
//! `timestamp - anchor`, so every output track starts at zero regardless
//! of the source's original offset.

use snip_containers::{AudioTrackMetadata, Muxer, VideoTrackMetadata};
use snip_core::{EncodedChunk, Error, Result};
use tracing::trace;

struct TrackAnchor {
    muxer_id: u32,
    anchor_us: Option<i64>,
    last_us: i64,
}

/// Adapter handle for one output container.
pub struct MuxerAdapter {
    muxer: Box<dyn Muxer>,
    tracks: Vec<TrackAnchor>,
}

impl MuxerAdapter {
    pub fn new(muxer: Box<dyn Muxer>) -> Self {
        Self {
            muxer,
            tracks: Vec::new(),
        }
    }

    /// Register a video track; errors when the target container has no
    /// token for the codec.
    pub fn add_video_track(&mut self, meta: &VideoTrackMetadata) -> Result<usize> {
        let muxer_id = self.muxer.add_video_track(meta)?;
        self.tracks.push(TrackAnchor {
            muxer_id,
            anchor_us: None,
            last_us: 0,
        });
        Ok(self.tracks.len() - 1)
    }

    pub fn add_audio_track(&mut self, meta: &AudioTrackMetadata) -> Result<usize> {
        let muxer_id = self.muxer.add_audio_track(meta)?;
        self.tracks.push(TrackAnchor {
            muxer_id,
            anchor_us: None,
            last_us: 0,
        });
        Ok(self.tracks.len() - 1)
    }

    /// Write one chunk, rebased to the track's zero anchor. Returns the
    /// rebased timestamp, which doubles as the track's progress position.
    pub fn write_chunk(&mut self, track: usize, mut chunk: EncodedChunk) -> Result<i64> {
        let state = self
            .tracks
            .get_mut(track)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown output track {track}")))?;

        let anchor = *state.anchor_us.get_or_insert(chunk.timestamp_us);
        chunk.timestamp_us -= anchor;
        if chunk.timestamp_us < state.last_us {
            return Err(Error::InvalidParameter(format!(
                "non-monotonic mux input: {} after {}",
                chunk.timestamp_us, state.last_us
            )));
        }
        state.last_us = chunk.timestamp_us;

        trace!(track, ts = chunk.timestamp_us, "muxing chunk");
        self.muxer.write_chunk(state.muxer_id, &chunk)?;
        Ok(chunk.timestamp_us)
    }

    /// Close the container and return its bytes and MIME type.
    pub fn finalize(self) -> Result<(Vec<u8>, &'static str)> {
        let mime = self.muxer.mime_type();
        let data = self.muxer.finalize()?;
        Ok((data, mime))
    }
}
