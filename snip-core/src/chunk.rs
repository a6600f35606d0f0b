//! Encoded media chunk abstractions.
//!
//! Chunks carry compressed data between the demuxer, the codec stages,
//! and the muxers. A chunk has exactly one consumer: whoever receives
//! it owns it.

use std::fmt;

/// Whether a chunk can be decoded without reference to earlier chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Sync sample / keyframe.
    Key,
    /// Predicted sample.
    Delta,
}

/// Colour description attached to video chunks when the container
/// declares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPrimaries {
    /// BT.601 (SD video).
    Bt601,
    /// BT.709 (HD video).
    #[default]
    Bt709,
    /// BT.2020 (UHD/HDR video).
    Bt2020,
}

/// An encoded media chunk.
///
/// Timestamps are microseconds on the presentation clock, already
/// corrected for any container-level edit-list offset.
pub struct EncodedChunk {
    /// Key or delta.
    pub kind: ChunkKind,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: i64,
    /// Duration in microseconds.
    pub duration_us: i64,
    /// Coded payload.
    pub data: Vec<u8>,
    /// Coded dimensions, for video chunks.
    pub coded_size: Option<(u32, u32)>,
    /// Colour description, for video chunks that declare one.
    pub color: Option<ColorPrimaries>,
}

impl EncodedChunk {
    /// Create a key chunk.
    pub fn key(timestamp_us: i64, duration_us: i64, data: Vec<u8>) -> Self {
        Self {
            kind: ChunkKind::Key,
            timestamp_us,
            duration_us,
            data,
            coded_size: None,
            color: None,
        }
    }

    /// Create a delta chunk.
    pub fn delta(timestamp_us: i64, duration_us: i64, data: Vec<u8>) -> Self {
        Self {
            kind: ChunkKind::Delta,
            timestamp_us,
            duration_us,
            data,
            coded_size: None,
            color: None,
        }
    }

    /// Attach coded dimensions.
    pub fn with_coded_size(mut self, width: u32, height: u32) -> Self {
        self.coded_size = Some((width, height));
        self
    }

    /// Attach a colour description.
    pub fn with_color(mut self, color: ColorPrimaries) -> Self {
        self.color = Some(color);
        self
    }

    /// Whether this is a sync sample.
    pub fn is_key(&self) -> bool {
        self.kind == ChunkKind::Key
    }

    /// End of the chunk's span on the presentation clock.
    pub fn end_us(&self) -> i64 {
        self.timestamp_us + self.duration_us
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for EncodedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedChunk")
            .field("kind", &self.kind)
            .field("timestamp_us", &self.timestamp_us)
            .field("duration_us", &self.duration_us)
            .field("size", &self.data.len())
            .field("coded_size", &self.coded_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = EncodedChunk::key(1_000, 33_333, vec![0u8; 128]);
        assert!(chunk.is_key());
        assert_eq!(chunk.size(), 128);
        assert_eq!(chunk.end_us(), 34_333);
    }

    #[test]
    fn test_delta_chunk() {
        let chunk = EncodedChunk::delta(0, 0, Vec::new());
        assert!(!chunk.is_key());
        assert_eq!(chunk.size(), 0);
    }

    #[test]
    fn test_coded_size_builder() {
        let chunk = EncodedChunk::key(0, 0, Vec::new()).with_coded_size(1920, 1080);
        assert_eq!(chunk.coded_size, Some((1920, 1080)));
    }

    #[test]
    fn test_debug_omits_payload() {
        let chunk = EncodedChunk::key(0, 10, vec![0xAB; 1024]);
        let s = format!("{chunk:?}");
        assert!(s.contains("size: 1024"));
        assert!(!s.contains("171")); // no raw bytes
    }
}
