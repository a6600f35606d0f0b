//! MP4/ISOBMFF container support.
//!
//! Reads MP4 files with H.264/H.265/AV1 video and AAC/Opus audio, and
//! writes trimmed output in the same family.

mod atoms;
mod demuxer;
mod muxer;

pub use demuxer::{ChunkStream, Mp4Demuxer};
pub use muxer::Mp4Muxer;

use byteorder::{BigEndian, ByteOrder};
use snip_core::{ContainerError, Result};

/// Read a 32-bit big-endian integer.
fn read_u32_be(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(ContainerError::from("not enough data for u32").into());
    }
    Ok(BigEndian::read_u32(data))
}

/// Read a 64-bit big-endian integer.
fn read_u64_be(data: &[u8]) -> Result<u64> {
    if data.len() < 8 {
        return Err(ContainerError::from("not enough data for u64").into());
    }
    Ok(BigEndian::read_u64(data))
}

/// Write a 32-bit big-endian integer.
fn write_u32_be(value: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    buf
}

/// Write a 64-bit big-endian integer.
fn write_u64_be(value: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    buf
}
