//! Quarter-turn rotation correction.
//!
//! Phone-recorded sources carry their orientation in container metadata
//! rather than in the coded pixels; frames are rendered into a scratch
//! raster rotated about its centre, swapping width and height for quarter
//! turns. The scratch buffer lives per extractor and is resized in place.

use snip_containers::Rotation;
use snip_core::{CodecError, Result, VideoFrame};

/// Reusable raster target for rotation correction.
#[derive(Default)]
pub struct RotationScratch {
    buf: Vec<u8>,
}

impl RotationScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotate `frame` clockwise in place. No-op for [`Rotation::R0`].
    ///
    /// Only packed pixel formats rotate; planar frames are rejected as
    /// unsupported rather than silently passed through.
    pub fn apply(&mut self, frame: &mut VideoFrame, rotation: Rotation) -> Result<()> {
        if rotation == Rotation::R0 {
            return Ok(());
        }
        let Some(bpp) = frame.format.bytes_per_pixel() else {
            return Err(CodecError::UnsupportedFormat(format!(
                "cannot rotate planar format {}",
                frame.format
            ))
            .into());
        };

        let (w, h) = (frame.width as usize, frame.height as usize);
        let expected = w * h * bpp;
        if frame.data.len() < expected {
            return Err(CodecError::Decode(format!(
                "frame buffer {} bytes, expected {}",
                frame.data.len(),
                expected
            ))
            .into());
        }

        self.buf.resize(expected, 0);
        let src = &frame.data[..expected];

        // dst(x, y) <- src(sx, sy) per quarter turn.
        match rotation {
            Rotation::R0 => unreachable!(),
            Rotation::R90 => {
                let (dw, dh) = (h, w);
                for dy in 0..dh {
                    for dx in 0..dw {
                        let (sx, sy) = (dy, h - 1 - dx);
                        copy_pixel(src, &mut self.buf, bpp, sx + sy * w, dx + dy * dw);
                    }
                }
            }
            Rotation::R180 => {
                for dy in 0..h {
                    for dx in 0..w {
                        let (sx, sy) = (w - 1 - dx, h - 1 - dy);
                        copy_pixel(src, &mut self.buf, bpp, sx + sy * w, dx + dy * w);
                    }
                }
            }
            Rotation::R270 => {
                let (dw, dh) = (h, w);
                for dy in 0..dh {
                    for dx in 0..dw {
                        let (sx, sy) = (w - 1 - dy, dx);
                        copy_pixel(src, &mut self.buf, bpp, sx + sy * w, dx + dy * dw);
                    }
                }
            }
        }

        std::mem::swap(&mut frame.data, &mut self.buf);
        frame.data.truncate(expected);
        if rotation.swaps_dimensions() {
            std::mem::swap(&mut frame.width, &mut frame.height);
        }
        Ok(())
    }
}

#[inline]
fn copy_pixel(src: &[u8], dst: &mut [u8], bpp: usize, src_px: usize, dst_px: usize) {
    dst[dst_px * bpp..(dst_px + 1) * bpp].copy_from_slice(&src[src_px * bpp..(src_px + 1) * bpp]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::PixelFormat;

    /// 2x1 gray frame with pixels [1, 2].
    fn two_pixel_frame() -> VideoFrame {
        let mut frame = VideoFrame::new(2, 1, PixelFormat::Gray8);
        frame.data.copy_from_slice(&[1, 2]);
        frame
    }

    #[test]
    fn test_rotate_90_swaps_dimensions() {
        let mut frame = two_pixel_frame();
        let mut scratch = RotationScratch::new();
        scratch.apply(&mut frame, Rotation::R90).unwrap();
        assert_eq!((frame.width, frame.height), (1, 2));
        // Clockwise: left pixel ends up on top.
        assert_eq!(frame.data, vec![1, 2]);
    }

    #[test]
    fn test_rotate_180_reverses() {
        let mut frame = two_pixel_frame();
        let mut scratch = RotationScratch::new();
        scratch.apply(&mut frame, Rotation::R180).unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.data, vec![2, 1]);
    }

    #[test]
    fn test_rotate_270() {
        let mut frame = two_pixel_frame();
        let mut scratch = RotationScratch::new();
        scratch.apply(&mut frame, Rotation::R270).unwrap();
        assert_eq!((frame.width, frame.height), (1, 2));
        assert_eq!(frame.data, vec![2, 1]);
    }

    #[test]
    fn test_four_quarter_turns_identity() {
        let mut frame = VideoFrame::new(3, 2, PixelFormat::Rgba);
        for (i, byte) in frame.data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let original = frame.data.clone();
        let mut scratch = RotationScratch::new();
        for _ in 0..4 {
            scratch.apply(&mut frame, Rotation::R90).unwrap();
        }
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.data, original);
    }

    #[test]
    fn test_planar_rejected() {
        let mut frame = VideoFrame::new(4, 4, PixelFormat::Yuv420p);
        let mut scratch = RotationScratch::new();
        assert!(scratch.apply(&mut frame, Rotation::R90).is_err());
    }

    #[test]
    fn test_r0_is_noop() {
        let mut frame = two_pixel_frame();
        let mut scratch = RotationScratch::new();
        scratch.apply(&mut frame, Rotation::R0).unwrap();
        assert_eq!(frame.data, vec![1, 2]);
    }
}
