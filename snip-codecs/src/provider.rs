//! Codec provider registry.

use snip_core::{Error, Result};

use crate::capabilities::PlatformCapabilities;
use crate::config::{
    AudioDecoderConfig, AudioEncoderConfig, VideoDecoderConfig, VideoEncoderConfig,
};
use crate::traits::{AudioDecoder, AudioEncoder, FrameTap, VideoDecoder, VideoEncoder};

/// The externally supplied decode/encode capability.
///
/// The orchestrator queries `supports_*` before any frame is processed and
/// fails fast with [`Error::UnsupportedCodec`] rather than downgrading
/// quality mid-stream. Factory methods hand out one processor per call;
/// handles are never shared between tracks or directions.
pub trait CodecProvider: Send + Sync {
    /// The platform capability table behind this provider.
    fn capabilities(&self) -> &PlatformCapabilities;

    fn supports_video_decode(&self, config: &VideoDecoderConfig) -> bool;
    fn supports_video_encode(&self, config: &VideoEncoderConfig) -> bool;
    fn supports_audio_decode(&self, config: &AudioDecoderConfig) -> bool;
    fn supports_audio_encode(&self, config: &AudioEncoderConfig) -> bool;

    fn video_decoder(&self, config: &VideoDecoderConfig) -> Result<Box<dyn VideoDecoder>>;
    fn video_encoder(&self, config: &VideoEncoderConfig) -> Result<Box<dyn VideoEncoder>>;
    fn audio_decoder(&self, config: &AudioDecoderConfig) -> Result<Box<dyn AudioDecoder>>;
    fn audio_encoder(&self, config: &AudioEncoderConfig) -> Result<Box<dyn AudioEncoder>>;

    /// Realtime capture for a track whose bitstream cannot be decoded.
    ///
    /// Providers without a playback surface keep the default, which makes
    /// extraction fail instead of falling back.
    fn frame_tap(&self, config: &VideoDecoderConfig) -> Result<Box<dyn FrameTap>> {
        Err(Error::DecodeUnavailable(format!(
            "no frame tap for {:?}",
            config.codec
        )))
    }
}
