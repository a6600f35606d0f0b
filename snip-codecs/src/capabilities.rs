//! Platform capability table.
//!
//! Re-expresses "is this platform known broken for a given decoder" as an
//! injected value object instead of ambient globals, so extractor fallback
//! selection can be exercised deterministically in tests.

use snip_containers::CodecId;

use crate::config::VideoEncoderConfig;

/// What the current platform can decode and encode.
#[derive(Debug, Clone, Default)]
pub struct PlatformCapabilities {
    broken_decoders: Vec<CodecId>,
    pub hardware_decode: bool,
    pub hardware_encode: bool,
    /// Maximum encodable frame size, when the platform caps it.
    pub max_encode_width: Option<u32>,
    pub max_encode_height: Option<u32>,
}

impl PlatformCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a decoder as unusable on this platform. Extraction for that
    /// codec goes straight to the capture fallback.
    pub fn with_broken_decoder(mut self, codec: CodecId) -> Self {
        if !self.broken_decoders.contains(&codec) {
            self.broken_decoders.push(codec);
        }
        self
    }

    pub fn with_max_encode_size(mut self, width: u32, height: u32) -> Self {
        self.max_encode_width = Some(width);
        self.max_encode_height = Some(height);
        self
    }

    /// Whether the platform decoder for `codec` should be trusted.
    pub fn decoder_usable(&self, codec: CodecId) -> bool {
        !self.broken_decoders.contains(&codec)
    }

    /// Whether an encode profile fits inside the platform's dimension caps.
    pub fn encode_size_ok(&self, config: &VideoEncoderConfig) -> bool {
        let width_ok = self.max_encode_width.map_or(true, |max| config.width <= max);
        let height_ok = self
            .max_encode_height
            .map_or(true, |max| config.height <= max);
        width_ok && height_ok
    }
}
