//! Decoder and encoder configuration types.
//!
//! Encoder configs are what callers override through trim options, so they
//! derive serde and can be persisted alongside a project document. Decoder
//! configs are derived from demuxed track metadata.

use serde::{Deserialize, Serialize};
use snip_containers::{AudioTrackMetadata, CodecId, VideoTrackMetadata};

/// Latency/quality trade-off hint for encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyMode {
    /// Favor compression efficiency; the encoder may buffer frames.
    #[default]
    Quality,
    /// Favor low queue depth over compression efficiency.
    Realtime,
}

/// Hardware acceleration hint for encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwarePreference {
    #[default]
    NoPreference,
    PreferHardware,
    PreferSoftware,
}

/// Video encode profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEncoderConfig {
    pub codec: CodecId,
    /// Output width in pixels, after any rotation correction.
    pub width: u32,
    /// Output height in pixels, after any rotation correction.
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    #[serde(default)]
    pub latency: LatencyMode,
    #[serde(default)]
    pub hardware: HardwarePreference,
}

impl VideoEncoderConfig {
    pub fn new(codec: CodecId, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
            bitrate: None,
            frame_rate: None,
            latency: LatencyMode::default(),
            hardware: HardwarePreference::default(),
        }
    }

    /// Build a profile from source track metadata, carrying over the coded
    /// dimensions in display orientation and the detected frame rate.
    pub fn from_track(codec: CodecId, meta: &VideoTrackMetadata) -> Self {
        let (width, height) = meta.display_size();
        Self {
            codec,
            width,
            height,
            bitrate: None,
            frame_rate: meta.frame_rate,
            latency: LatencyMode::default(),
            hardware: HardwarePreference::default(),
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }
}

/// Audio encode profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEncoderConfig {
    pub codec: CodecId,
    pub sample_rate: u32,
    pub channels: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
}

impl AudioEncoderConfig {
    pub fn new(codec: CodecId, sample_rate: u32, channels: u32) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bitrate: None,
        }
    }

    pub fn from_track(codec: CodecId, meta: &AudioTrackMetadata) -> Self {
        Self::new(codec, meta.sample_rate, meta.channels)
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }
}

/// Video decode configuration, derived from the demuxed track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDecoderConfig {
    pub codec: CodecId,
    /// Codec-specific description bytes (avcC/hvcC/...).
    pub codec_config: Option<Vec<u8>>,
    pub coded_width: u32,
    pub coded_height: u32,
}

impl From<&VideoTrackMetadata> for VideoDecoderConfig {
    fn from(meta: &VideoTrackMetadata) -> Self {
        Self {
            codec: meta.codec,
            codec_config: meta.codec_config.clone(),
            coded_width: meta.width,
            coded_height: meta.height,
        }
    }
}

/// Audio decode configuration, derived from the demuxed track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDecoderConfig {
    pub codec: CodecId,
    /// Codec-specific description bytes (AudioSpecificConfig for AAC).
    pub codec_config: Option<Vec<u8>>,
    pub sample_rate: u32,
    pub channels: u32,
}

impl From<&AudioTrackMetadata> for AudioDecoderConfig {
    fn from(meta: &AudioTrackMetadata) -> Self {
        Self {
            codec: meta.codec,
            codec_config: meta.codec_config.clone(),
            sample_rate: meta.sample_rate,
            channels: meta.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_containers::Rotation;

    fn audio_meta() -> AudioTrackMetadata {
        AudioTrackMetadata {
            codec: CodecId::Aac,
            codec_config: Some(vec![0x12, 0x10]),
            sample_rate: 48_000,
            channels: 2,
            duration_us: 10_000_000,
        }
    }

    #[test]
    fn test_audio_configs_carry_track_layout() {
        let meta = audio_meta();
        let encode = AudioEncoderConfig::from_track(CodecId::Opus, &meta);
        assert_eq!((encode.sample_rate, encode.channels), (48_000, 2));

        let decode = AudioDecoderConfig::from(&meta);
        assert_eq!(decode.sample_rate, meta.sample_rate);
        assert_eq!(decode.channels, meta.channels);
        assert_eq!(decode.codec_config, meta.codec_config);
    }

    fn meta(rotation: Rotation) -> VideoTrackMetadata {
        VideoTrackMetadata {
            codec: CodecId::H264,
            codec_config: None,
            width: 1920,
            height: 1080,
            rotation,
            duration_us: 10_000_000,
            frame_rate: Some(30.0),
        }
    }

    #[test]
    fn test_from_track_uses_display_orientation() {
        let config = VideoEncoderConfig::from_track(CodecId::Vp9, &meta(Rotation::R90));
        assert_eq!((config.width, config.height), (1080, 1920));
        assert_eq!(config.frame_rate, Some(30.0));

        let config = VideoEncoderConfig::from_track(CodecId::Vp9, &meta(Rotation::R0));
        assert_eq!((config.width, config.height), (1920, 1080));
    }

    #[test]
    fn test_encoder_config_serde_round_trip() {
        let config = VideoEncoderConfig::new(CodecId::Vp9, 1280, 720)
            .with_bitrate(2_000_000)
            .with_frame_rate(30.0);
        let json = serde_json::to_string(&config).unwrap();
        let back: VideoEncoderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_defaults_fill_in_when_absent() {
        let config: VideoEncoderConfig =
            serde_json::from_str(r#"{"codec":"Vp9","width":640,"height":480}"#).unwrap();
        assert_eq!(config.latency, LatencyMode::Quality);
        assert_eq!(config.hardware, HardwarePreference::NoPreference);
        assert_eq!(config.bitrate, None);
    }
}
