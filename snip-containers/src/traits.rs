//! Common types and traits shared by the container implementations.

use snip_core::{ContainerError, EncodedChunk, Result};

/// Identified container format of an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp4,
    WebM,
}

impl ContainerFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::WebM => "video/webm",
        }
    }
}

/// Identify a container by file signature.
///
/// MP4 carries `ftyp` at byte 4; WebM opens with the EBML magic.
pub fn probe(data: &[u8]) -> Result<ContainerFormat> {
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Ok(ContainerFormat::Mp4);
    }
    if data.len() >= 4 && data[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Ok(ContainerFormat::WebM);
    }
    let found = data
        .get(4..8)
        .filter(|b| b.iter().all(|c| c.is_ascii_graphic()))
        .map(|b| String::from_utf8_lossy(b).into_owned());
    Err(ContainerError::UnknownFormat { found }.into())
}

/// Track media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CodecId {
    H264,
    Hevc,
    Av1,
    Vp8,
    Vp9,
    Aac,
    Opus,
    Unknown,
}

impl CodecId {
    /// Map an MP4 sample entry fourcc to a codec.
    pub fn from_sample_entry(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"avc1" | b"avc3" => Self::H264,
            b"hvc1" | b"hev1" => Self::Hevc,
            b"av01" => Self::Av1,
            b"vp08" => Self::Vp8,
            b"vp09" => Self::Vp9,
            b"mp4a" => Self::Aac,
            b"Opus" => Self::Opus,
            _ => Self::Unknown,
        }
    }

    /// Sample entry fourcc used when writing MP4.
    pub fn mp4_fourcc(&self) -> Option<&'static [u8; 4]> {
        match self {
            Self::H264 => Some(b"avc1"),
            Self::Hevc => Some(b"hvc1"),
            Self::Av1 => Some(b"av01"),
            Self::Vp9 => Some(b"vp09"),
            Self::Aac => Some(b"mp4a"),
            Self::Opus => Some(b"Opus"),
            Self::Vp8 | Self::Unknown => None,
        }
    }

    /// CodecID token used when writing WebM tracks.
    pub fn webm_codec_id(&self) -> Option<&'static str> {
        match self {
            Self::Vp8 => Some("V_VP8"),
            Self::Vp9 => Some("V_VP9"),
            Self::Av1 => Some("V_AV1"),
            Self::Opus => Some("A_OPUS"),
            _ => None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            Self::H264 | Self::Hevc | Self::Av1 | Self::Vp8 | Self::Vp9
        )
    }
}

/// Display orientation baked into the container, in quarter turns
/// clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Whether applying this rotation swaps width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Self {
        match degrees % 360 {
            90 => Self::R90,
            180 => Self::R180,
            270 => Self::R270,
            _ => Self::R0,
        }
    }
}

/// Description of a video track as parsed from the container.
#[derive(Debug, Clone)]
pub struct VideoTrackMetadata {
    pub codec: CodecId,
    /// Codec-specific configuration record (avcC, hvcC, ...).
    pub codec_config: Option<Vec<u8>>,
    /// Coded width before rotation.
    pub width: u32,
    /// Coded height before rotation.
    pub height: u32,
    pub rotation: Rotation,
    /// Track duration in microseconds.
    pub duration_us: i64,
    /// Average frame rate, when derivable from the sample table.
    pub frame_rate: Option<f64>,
}

impl VideoTrackMetadata {
    /// Dimensions after the container rotation is applied.
    pub fn display_size(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Description of an audio track as parsed from the container.
#[derive(Debug, Clone)]
pub struct AudioTrackMetadata {
    pub codec: CodecId,
    /// Codec-specific configuration record (esds payload, ...).
    pub codec_config: Option<Vec<u8>>,
    pub sample_rate: u32,
    pub channels: u32,
    /// Track duration in microseconds.
    pub duration_us: i64,
}

/// Per-track container metadata.
#[derive(Debug, Clone)]
pub enum TrackMetadata {
    Video(VideoTrackMetadata),
    Audio(AudioTrackMetadata),
}

impl TrackMetadata {
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Video(_) => TrackKind::Video,
            Self::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn codec(&self) -> CodecId {
        match self {
            Self::Video(v) => v.codec,
            Self::Audio(a) => a.codec,
        }
    }

    pub fn duration_us(&self) -> i64 {
        match self {
            Self::Video(v) => v.duration_us,
            Self::Audio(a) => a.duration_us,
        }
    }
}

/// Output container writer.
///
/// Tracks are registered before the first chunk is written; `finalize`
/// consumes the muxer and yields the complete file.
pub trait Muxer {
    /// Register a video track. Returns the muxer-local track id.
    fn add_video_track(&mut self, meta: &VideoTrackMetadata) -> Result<u32>;

    /// Register an audio track. Returns the muxer-local track id.
    fn add_audio_track(&mut self, meta: &AudioTrackMetadata) -> Result<u32>;

    /// Append a coded chunk to a registered track. Chunks must arrive
    /// in presentation order per track.
    fn write_chunk(&mut self, track_id: u32, chunk: &EncodedChunk) -> Result<()>;

    /// Finish the file and return its bytes.
    fn finalize(self: Box<Self>) -> Result<Vec<u8>>;

    /// MIME type of the produced file.
    fn mime_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_mp4() {
        let mut data = vec![0, 0, 0, 24];
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0; 16]);
        assert_eq!(probe(&data).unwrap(), ContainerFormat::Mp4);
    }

    #[test]
    fn test_probe_webm() {
        let data = [0x1A, 0x45, 0xDF, 0xA3, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(probe(&data).unwrap(), ContainerFormat::WebM);
    }

    #[test]
    fn test_probe_unknown() {
        let err = probe(b"RIFF....AVI LIST").unwrap_err();
        assert!(err.to_string().contains("Unknown container format"));
    }

    #[test]
    fn test_codec_fourcc_mapping() {
        assert_eq!(CodecId::from_sample_entry(b"avc1"), CodecId::H264);
        assert_eq!(CodecId::from_sample_entry(b"hev1"), CodecId::Hevc);
        assert_eq!(CodecId::from_sample_entry(b"zzzz"), CodecId::Unknown);
        assert_eq!(CodecId::H264.mp4_fourcc(), Some(b"avc1"));
        assert_eq!(CodecId::Vp8.mp4_fourcc(), None);
        assert_eq!(CodecId::Vp9.webm_codec_id(), Some("V_VP9"));
    }

    #[test]
    fn test_rotation() {
        assert!(Rotation::R90.swaps_dimensions());
        assert!(!Rotation::R180.swaps_dimensions());
        assert_eq!(Rotation::from_degrees(450), Rotation::R90);
    }

    #[test]
    fn test_display_size() {
        let meta = VideoTrackMetadata {
            codec: CodecId::H264,
            codec_config: None,
            width: 1920,
            height: 1080,
            rotation: Rotation::R90,
            duration_us: 0,
            frame_rate: None,
        };
        assert_eq!(meta.display_size(), (1080, 1920));
    }
}
