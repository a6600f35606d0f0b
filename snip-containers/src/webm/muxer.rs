//! WebM muxer.
//!
//! Builds the whole document in memory with definite element sizes:
//! EBML header, segment info, tracks, clusters of SimpleBlocks, and a
//! cue index over video keyframe clusters.

use super::ebml;
use super::elements::*;
use crate::traits::{AudioTrackMetadata, Muxer, VideoTrackMetadata};
use snip_core::{ContainerError, EncodedChunk, Result};
use tracing::debug;

/// Timecode scale: one tick per millisecond.
pub const TIMECODE_SCALE_NS: u64 = 1_000_000;

/// Maximum cluster span before a new cluster starts, in ms.
const MAX_CLUSTER_DURATION_MS: i64 = 5000;

struct TrackConfig {
    /// 1-based Matroska track number.
    number: u64,
    is_video: bool,
    codec_id: &'static str,
    codec_private: Option<Vec<u8>>,
    width: u32,
    height: u32,
    sample_rate: u32,
    channels: u32,
    frame_rate: Option<f64>,
}

struct CueEntry {
    /// Timestamp in timecode units.
    time: u64,
    track: u64,
    /// Byte offset of the cluster within the cluster buffer.
    cluster_offset: u64,
}

/// WebM muxer building an in-memory file.
pub struct WebmMuxer {
    tracks: Vec<TrackConfig>,
    /// Closed clusters, concatenated.
    clusters: Vec<u8>,
    /// Open cluster payload (timestamp element + blocks).
    current_cluster: Vec<u8>,
    current_cluster_offset: u64,
    cluster_timestamp_ms: i64,
    in_cluster: bool,
    cue_entries: Vec<CueEntry>,
    max_timestamp_ms: i64,
    started: bool,
}

impl WebmMuxer {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            clusters: Vec::new(),
            current_cluster: Vec::new(),
            current_cluster_offset: 0,
            cluster_timestamp_ms: 0,
            in_cluster: false,
            cue_entries: Vec::new(),
            max_timestamp_ms: 0,
            started: false,
        }
    }

    fn close_cluster(&mut self) {
        if !self.in_cluster {
            return;
        }
        ebml::write_element(&mut self.clusters, CLUSTER, &self.current_cluster);
        self.current_cluster.clear();
        self.in_cluster = false;
    }

    fn start_cluster(&mut self, timestamp_ms: i64) {
        self.close_cluster();
        self.current_cluster_offset = self.clusters.len() as u64;
        self.cluster_timestamp_ms = timestamp_ms;
        ebml::write_uint(&mut self.current_cluster, TIMESTAMP, timestamp_ms.max(0) as u64);
        self.in_cluster = true;
    }

    fn build_ebml_header() -> Vec<u8> {
        let mut content = Vec::new();
        ebml::write_uint(&mut content, EBML_VERSION, 1);
        ebml::write_uint(&mut content, EBML_READ_VERSION, 1);
        ebml::write_uint(&mut content, EBML_MAX_ID_LENGTH, 4);
        ebml::write_uint(&mut content, EBML_MAX_SIZE_LENGTH, 8);
        ebml::write_string(&mut content, DOC_TYPE, "webm");
        ebml::write_uint(&mut content, DOC_TYPE_VERSION, 4);
        ebml::write_uint(&mut content, DOC_TYPE_READ_VERSION, 2);

        let mut out = Vec::new();
        ebml::write_element(&mut out, EBML, &content);
        out
    }

    fn build_info(&self) -> Vec<u8> {
        let mut content = Vec::new();
        ebml::write_uint(&mut content, TIMECODE_SCALE, TIMECODE_SCALE_NS);
        ebml::write_string(&mut content, MUXING_APP, "snip");
        ebml::write_string(&mut content, WRITING_APP, "snip");
        ebml::write_float(&mut content, DURATION, self.max_timestamp_ms as f64);

        let mut out = Vec::new();
        ebml::write_element(&mut out, INFO, &content);
        out
    }

    fn build_tracks(&self) -> Vec<u8> {
        let mut content = Vec::new();
        for track in &self.tracks {
            let mut entry = Vec::new();
            ebml::write_uint(&mut entry, TRACK_NUMBER, track.number);
            ebml::write_uint(&mut entry, TRACK_UID, track.number);
            ebml::write_uint(
                &mut entry,
                TRACK_TYPE,
                if track.is_video {
                    TRACK_TYPE_VIDEO
                } else {
                    TRACK_TYPE_AUDIO
                },
            );
            ebml::write_uint(&mut entry, FLAG_LACING, 0);
            ebml::write_string(&mut entry, CODEC_ID, track.codec_id);
            if let Some(ref private) = track.codec_private {
                ebml::write_element(&mut entry, CODEC_PRIVATE, private);
            }

            if track.is_video {
                if let Some(fps) = track.frame_rate {
                    if fps > 0.0 {
                        ebml::write_uint(
                            &mut entry,
                            DEFAULT_DURATION,
                            (1_000_000_000.0 / fps) as u64,
                        );
                    }
                }
                let mut video = Vec::new();
                ebml::write_uint(&mut video, PIXEL_WIDTH, track.width as u64);
                ebml::write_uint(&mut video, PIXEL_HEIGHT, track.height as u64);
                ebml::write_element(&mut entry, VIDEO, &video);
            } else {
                let mut audio = Vec::new();
                ebml::write_float(&mut audio, SAMPLING_FREQUENCY, track.sample_rate as f64);
                ebml::write_uint(&mut audio, CHANNELS, track.channels as u64);
                ebml::write_element(&mut entry, AUDIO, &audio);
            }

            ebml::write_element(&mut content, TRACK_ENTRY, &entry);
        }

        let mut out = Vec::new();
        ebml::write_element(&mut out, TRACKS, &content);
        out
    }

    /// Cues index. `clusters_base` is the byte offset of the cluster
    /// buffer relative to the segment payload start.
    fn build_cues(&self, clusters_base: u64) -> Vec<u8> {
        if self.cue_entries.is_empty() {
            return Vec::new();
        }

        let mut content = Vec::new();
        for entry in &self.cue_entries {
            let mut positions = Vec::new();
            ebml::write_uint(&mut positions, CUE_TRACK, entry.track);
            ebml::write_uint(
                &mut positions,
                CUE_CLUSTER_POSITION,
                clusters_base + entry.cluster_offset,
            );

            let mut point = Vec::new();
            ebml::write_uint(&mut point, CUE_TIME, entry.time);
            ebml::write_element(&mut point, CUE_TRACK_POSITIONS, &positions);

            ebml::write_element(&mut content, CUE_POINT, &point);
        }

        let mut out = Vec::new();
        ebml::write_element(&mut out, CUES, &content);
        out
    }
}

impl Default for WebmMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for WebmMuxer {
    fn add_video_track(&mut self, meta: &VideoTrackMetadata) -> Result<u32> {
        if self.started {
            return Err(ContainerError::from("cannot add tracks after first chunk").into());
        }
        let codec_id = meta.codec.webm_codec_id().ok_or_else(|| {
            ContainerError::Other(format!("codec {:?} cannot be written to webm", meta.codec))
        })?;

        let number = self.tracks.len() as u64 + 1;
        self.tracks.push(TrackConfig {
            number,
            is_video: true,
            codec_id,
            codec_private: meta.codec_config.clone(),
            width: meta.width,
            height: meta.height,
            sample_rate: 0,
            channels: 0,
            frame_rate: meta.frame_rate,
        });
        Ok(number as u32 - 1)
    }

    fn add_audio_track(&mut self, meta: &AudioTrackMetadata) -> Result<u32> {
        if self.started {
            return Err(ContainerError::from("cannot add tracks after first chunk").into());
        }
        let codec_id = meta.codec.webm_codec_id().ok_or_else(|| {
            ContainerError::Other(format!("codec {:?} cannot be written to webm", meta.codec))
        })?;

        let number = self.tracks.len() as u64 + 1;
        self.tracks.push(TrackConfig {
            number,
            is_video: false,
            codec_id,
            codec_private: meta.codec_config.clone(),
            width: 0,
            height: 0,
            sample_rate: meta.sample_rate,
            channels: meta.channels,
            frame_rate: None,
        });
        Ok(number as u32 - 1)
    }

    fn write_chunk(&mut self, track_id: u32, chunk: &EncodedChunk) -> Result<()> {
        let track = self
            .tracks
            .get(track_id as usize)
            .ok_or(ContainerError::TrackNotFound {
                index: track_id as usize,
            })?;
        let track_number = track.number;
        let is_video = track.is_video;
        self.started = true;

        let timestamp_ms = chunk.timestamp_us / 1000;
        self.max_timestamp_ms = self.max_timestamp_ms.max(timestamp_ms);

        let start_new = !self.in_cluster
            || (is_video && chunk.is_key())
            || timestamp_ms - self.cluster_timestamp_ms >= MAX_CLUSTER_DURATION_MS;

        if start_new {
            self.start_cluster(timestamp_ms);
            if is_video && chunk.is_key() {
                self.cue_entries.push(CueEntry {
                    time: timestamp_ms.max(0) as u64,
                    track: track_number,
                    cluster_offset: self.current_cluster_offset,
                });
            }
        }

        // SimpleBlock: track VINT, relative i16 timestamp, flags, data.
        let relative_ts = (timestamp_ms - self.cluster_timestamp_ms)
            .clamp(i16::MIN as i64, i16::MAX as i64) as i16;

        let mut block = Vec::with_capacity(chunk.data.len() + 4);
        ebml::write_vint(&mut block, track_number);
        block.extend_from_slice(&relative_ts.to_be_bytes());
        block.push(if chunk.is_key() { 0x80 } else { 0x00 });
        block.extend_from_slice(&chunk.data);

        ebml::write_element(&mut self.current_cluster, SIMPLE_BLOCK, &block);
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<Vec<u8>> {
        self.close_cluster();

        let info = self.build_info();
        let tracks = self.build_tracks();
        let clusters_base = (info.len() + tracks.len()) as u64;
        let cues = self.build_cues(clusters_base);

        let mut segment = Vec::with_capacity(clusters_base as usize + self.clusters.len());
        segment.extend_from_slice(&info);
        segment.extend_from_slice(&tracks);
        segment.extend_from_slice(&self.clusters);
        segment.extend_from_slice(&cues);

        let mut out = Self::build_ebml_header();
        ebml::write_element(&mut out, SEGMENT, &segment);

        debug!(size = out.len(), tracks = self.tracks.len(), "finalized webm");
        Ok(out)
    }

    fn mime_type(&self) -> &'static str {
        "video/webm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{CodecId, Rotation};
    use snip_core::chunk::EncodedChunk;

    fn vp9_meta() -> VideoTrackMetadata {
        VideoTrackMetadata {
            codec: CodecId::Vp9,
            codec_config: None,
            width: 640,
            height: 360,
            rotation: Rotation::R0,
            duration_us: 0,
            frame_rate: Some(30.0),
        }
    }

    #[test]
    fn test_starts_with_ebml_magic() {
        let mut muxer = Box::new(WebmMuxer::new());
        let id = muxer.add_video_track(&vp9_meta()).unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::key(0, 33_333, vec![1, 2, 3]))
            .unwrap();
        let bytes = muxer.finalize().unwrap();
        assert_eq!(&bytes[0..4], &[0x1A, 0x45, 0xDF, 0xA3]);
    }

    #[test]
    fn test_rejects_mp4_only_codec() {
        let mut muxer = WebmMuxer::new();
        let mut meta = vp9_meta();
        meta.codec = CodecId::H264;
        assert!(muxer.add_video_track(&meta).is_err());
    }

    #[test]
    fn test_keyframe_starts_new_cluster() {
        let mut muxer = WebmMuxer::new();
        let id = muxer.add_video_track(&vp9_meta()).unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::key(0, 33_333, vec![0; 8]))
            .unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::delta(33_333, 33_333, vec![0; 8]))
            .unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::key(66_666, 33_333, vec![0; 8]))
            .unwrap();
        // Two keyframes, two cue entries.
        assert_eq!(muxer.cue_entries.len(), 2);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(WebmMuxer::new().mime_type(), "video/webm");
    }
}
