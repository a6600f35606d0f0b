//! Decoded video frame abstractions.

use std::fmt;

/// Pixel format for decoded frames.
///
/// The trim pipeline moves packed formats; planar YUV is carried for
/// codecs that emit it natively but rotation correction requires a
/// packed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Packed RGBA, 32bpp.
    Rgba,
    /// Packed RGB, 24bpp.
    Rgb24,
    /// Grayscale, 8bpp.
    Gray8,
    /// Planar YUV 4:2:0, 12bpp.
    Yuv420p,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats; `None` for planar formats.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Rgba => Some(4),
            Self::Rgb24 => Some(3),
            Self::Gray8 => Some(1),
            Self::Yuv420p => None,
        }
    }

    /// Whether this format stores one packed plane.
    pub fn is_packed(&self) -> bool {
        self.bytes_per_pixel().is_some()
    }

    /// Total buffer size for the given dimensions.
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Rgba => pixels * 4,
            Self::Rgb24 => pixels * 3,
            Self::Gray8 => pixels,
            Self::Yuv420p => pixels + pixels / 2,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba => write!(f, "rgba"),
            Self::Rgb24 => write!(f, "rgb24"),
            Self::Gray8 => write!(f, "gray8"),
            Self::Yuv420p => write!(f, "yuv420p"),
        }
    }
}

/// A decoded video frame.
///
/// Owned by exactly one stage at a time; a stage that does not forward
/// a frame drops it, which releases the buffer.
#[derive(Clone)]
pub struct VideoFrame {
    /// Pixel data, tightly packed (no stride padding).
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: i64,
    /// Duration in microseconds, when the decoder reports one.
    pub duration_us: Option<i64>,
}

impl VideoFrame {
    /// Create a zero-filled frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data: vec![0u8; format.buffer_size(width, height)],
            width,
            height,
            format,
            timestamp_us: 0,
            duration_us: None,
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp_us: i64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration_us: i64) -> Self {
        self.duration_us = Some(duration_us);
        self
    }

    /// End of the frame's span, treating a missing duration as zero.
    pub fn end_us(&self) -> i64 {
        self.timestamp_us + self.duration_us.unwrap_or(0)
    }

    /// Whether the frame is visually portrait-oriented.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp_us", &self.timestamp_us)
            .field("duration_us", &self.duration_us)
            .finish()
    }
}
