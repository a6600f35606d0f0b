//! MP4 atom (box) parsing.

use super::{read_u32_be, read_u64_be};
use snip_core::{ContainerError, Result};
use std::io::{Read, Seek, SeekFrom};

/// Upper bound on declared table entry counts. A malformed file can
/// declare billions of entries; never allocate ahead of what the data
/// can actually hold.
const MAX_TABLE_ENTRIES: usize = 4 << 20;

fn capped_capacity(declared: usize, bytes_available: usize, bytes_per_entry: usize) -> usize {
    declared
        .min(bytes_available / bytes_per_entry.max(1))
        .min(MAX_TABLE_ENTRIES)
}

/// Atom header.
#[derive(Debug, Clone)]
pub struct AtomHeader {
    /// Atom type (4 bytes).
    pub atom_type: [u8; 4],
    /// Atom size (including header).
    pub size: u64,
    /// Header size (8 or 16 bytes).
    pub header_size: u8,
    /// Offset in file.
    pub offset: u64,
}

impl AtomHeader {
    /// Read an atom header. Returns `Ok(None)` on clean EOF.
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Option<Self>> {
        let offset = reader.stream_position()?;

        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let atom_type = [header[4], header[5], header[6], header[7]];

        let (size, header_size) = if size == 1 {
            // Extended size
            let mut ext_size = [0u8; 8];
            reader.read_exact(&mut ext_size)?;
            (u64::from_be_bytes(ext_size), 16u8)
        } else if size == 0 {
            // Size extends to end of file
            let current = reader.stream_position()?;
            let end = reader.seek(SeekFrom::End(0))?;
            reader.seek(SeekFrom::Start(current))?;
            (end - offset, 8)
        } else {
            (size as u64, 8)
        };

        if size < header_size as u64 {
            return Err(ContainerError::InvalidSize {
                offset,
                message: format!("atom size {size} smaller than its header"),
            }
            .into());
        }

        Ok(Some(Self {
            atom_type,
            size,
            header_size,
            offset,
        }))
    }

    /// Content size (size minus header).
    pub fn content_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }

    /// Read this atom's content into a bounded buffer.
    pub fn read_content<R: Read + Seek + ?Sized>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let len = reader.seek(SeekFrom::End(0))?;
        let pos = self.offset + self.header_size as u64;
        reader.seek(SeekFrom::Start(pos))?;

        let size = self.content_size();
        if pos + size > len {
            return Err(ContainerError::InvalidSize {
                offset: self.offset,
                message: format!("atom extends {} bytes past end of file", pos + size - len),
            }
            .into());
        }

        let mut content = vec![0u8; size as usize];
        reader.read_exact(&mut content)?;
        Ok(content)
    }
}

/// Movie header atom (mvhd).
#[derive(Debug, Clone)]
pub struct MvhdAtom {
    pub timescale: u32,
    pub duration: u64,
}

impl MvhdAtom {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ContainerError::from("mvhd atom empty").into());
        }

        let version = data[0];
        let (timescale, duration) = if version == 1 {
            if data.len() < 32 {
                return Err(ContainerError::from("mvhd v1 atom too short").into());
            }
            (read_u32_be(&data[20..24])?, read_u64_be(&data[24..32])?)
        } else {
            if data.len() < 20 {
                return Err(ContainerError::from("mvhd v0 atom too short").into());
            }
            (read_u32_be(&data[12..16])?, read_u32_be(&data[16..20])? as u64)
        };

        Ok(Self {
            timescale,
            duration,
        })
    }
}

/// Track header atom (tkhd). Only the display matrix is consumed; the
/// track id and dimensions come from the sample description instead.
#[derive(Debug, Clone)]
pub struct TkhdAtom {
    /// Upper-left 2x2 of the display matrix, 16.16 fixed point.
    pub matrix: [i32; 4],
}

impl TkhdAtom {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ContainerError::from("tkhd atom empty").into());
        }

        let version = data[0];
        let offset = if version == 1 {
            if data.len() < 36 {
                return Err(ContainerError::from("tkhd v1 atom too short").into());
            }
            36
        } else {
            if data.len() < 24 {
                return Err(ContainerError::from("tkhd v0 atom too short").into());
            }
            24
        };

        // reserved(8) + layer(2) + alternate_group(2) + volume(2) + reserved(2)
        let matrix_offset = offset + 16;
        let matrix = if data.len() >= matrix_offset + 36 {
            [
                read_u32_be(&data[matrix_offset..matrix_offset + 4])? as i32,
                read_u32_be(&data[matrix_offset + 4..matrix_offset + 8])? as i32,
                read_u32_be(&data[matrix_offset + 12..matrix_offset + 16])? as i32,
                read_u32_be(&data[matrix_offset + 16..matrix_offset + 20])? as i32,
            ]
        } else {
            [0x0001_0000, 0, 0, 0x0001_0000]
        };

        Ok(Self { matrix })
    }

    /// Quarter-turn rotation encoded by the display matrix, in degrees
    /// clockwise. Non-rotational matrices report 0.
    pub fn rotation_degrees(&self) -> u32 {
        const ONE: i32 = 0x0001_0000;
        let [a, b, c, d] = self.matrix;
        match (a, b, c, d) {
            (0, ONE, x, 0) if x == -ONE => 90,
            (x, 0, 0, y) if x == -ONE && y == -ONE => 180,
            (0, x, ONE, 0) if x == -ONE => 270,
            _ => 0,
        }
    }
}

/// Media header atom (mdhd).
#[derive(Debug, Clone)]
pub struct MdhdAtom {
    pub timescale: u32,
    pub duration: u64,
}

impl MdhdAtom {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ContainerError::from("mdhd atom empty").into());
        }

        let version = data[0];
        let (timescale, duration) = if version == 1 {
            if data.len() < 32 {
                return Err(ContainerError::from("mdhd v1 atom too short").into());
            }
            (read_u32_be(&data[20..24])?, read_u64_be(&data[24..32])?)
        } else {
            if data.len() < 20 {
                return Err(ContainerError::from("mdhd v0 atom too short").into());
            }
            (read_u32_be(&data[12..16])?, read_u32_be(&data[16..20])? as u64)
        };

        Ok(Self {
            timescale,
            duration,
        })
    }
}

/// Handler reference atom (hdlr).
#[derive(Debug, Clone)]
pub struct HdlrAtom {
    pub handler_type: [u8; 4],
}

impl HdlrAtom {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(ContainerError::from("hdlr atom too short").into());
        }
        Ok(Self {
            handler_type: [data[8], data[9], data[10], data[11]],
        })
    }

    pub fn is_video(&self) -> bool {
        &self.handler_type == b"vide"
    }

    pub fn is_audio(&self) -> bool {
        &self.handler_type == b"soun"
    }
}

/// One edit list entry.
#[derive(Debug, Clone, Copy)]
pub struct ElstEntry {
    /// Start within the media in media timescale units; -1 marks an
    /// empty edit.
    pub media_time: i64,
}

/// Edit list atom (elst).
#[derive(Debug, Clone, Default)]
pub struct ElstAtom {
    pub entries: Vec<ElstEntry>,
}

impl ElstAtom {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ContainerError::from("elst atom too short").into());
        }

        let version = data[0];
        let entry_count = read_u32_be(&data[4..8])? as usize;
        let entry_size = if version == 1 { 20 } else { 12 };
        let mut entries =
            Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, entry_size));
        let mut offset = 8;

        for _ in 0..entry_count {
            if offset + entry_size > data.len() {
                break;
            }
            let media_time = if version == 1 {
                read_u64_be(&data[offset + 8..offset + 16])? as i64
            } else {
                read_u32_be(&data[offset + 4..offset + 8])? as i32 as i64
            };
            entries.push(ElstEntry { media_time });
            offset += entry_size;
        }

        Ok(Self { entries })
    }

    /// Media time of the first non-empty edit, in media timescale
    /// units. This is the offset the edit list shifts presentation by.
    pub fn media_time_offset(&self) -> i64 {
        self.entries
            .iter()
            .find(|e| e.media_time >= 0)
            .map_or(0, |e| e.media_time)
    }
}

/// Sample entry description from stsd.
#[derive(Debug, Clone)]
pub struct SampleEntry {
    pub entry_type: [u8; 4],
    pub width: u16,
    pub height: u16,
    /// Audio sample rate, 16.16 fixed point.
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Codec configuration child atoms (avcC, hvcC, esds, ...).
    pub codec_data: Vec<u8>,
}

/// Sample table box (stbl) contents.
#[derive(Debug, Clone, Default)]
pub struct StblInfo {
    pub sample_entries: Vec<SampleEntry>,
    pub sample_sizes: Vec<u32>,
    /// (first_chunk, samples_per_chunk, description_index)
    pub stsc: Vec<(u32, u32, u32)>,
    pub chunk_offsets: Vec<u64>,
    /// (sample_count, sample_delta)
    pub stts: Vec<(u32, u32)>,
    /// (sample_count, composition_offset)
    pub ctts: Vec<(u32, i32)>,
    /// 1-based sync sample numbers. Empty means every sample syncs.
    pub stss: Vec<u32>,
}

impl StblInfo {
    pub fn parse<R: Read + Seek + ?Sized>(reader: &mut R, stbl_size: u64) -> Result<Self> {
        let start = reader.stream_position()?;
        let end = start + stbl_size;
        let mut info = StblInfo::default();

        while reader.stream_position()? < end {
            let Some(header) = AtomHeader::read(reader)? else {
                break;
            };
            let content = header.read_content(reader)?;

            match &header.atom_type {
                b"stsd" => info.sample_entries = Self::parse_stsd(&content)?,
                b"stsz" | b"stz2" => info.sample_sizes = Self::parse_stsz(&content)?,
                b"stsc" => info.stsc = Self::parse_stsc(&content)?,
                b"stco" => info.chunk_offsets = Self::parse_stco(&content)?,
                b"co64" => info.chunk_offsets = Self::parse_co64(&content)?,
                b"stts" => info.stts = Self::parse_stts(&content)?,
                b"ctts" => info.ctts = Self::parse_ctts(&content)?,
                b"stss" => info.stss = Self::parse_stss(&content)?,
                _ => {}
            }
        }

        Ok(info)
    }

    pub fn sample_count(&self) -> usize {
        self.sample_sizes.len()
    }

    fn parse_stsd(data: &[u8]) -> Result<Vec<SampleEntry>> {
        if data.len() < 8 {
            return Err(ContainerError::from("stsd too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut entries = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 16));
        let mut offset = 8;

        for _ in 0..entry_count {
            if offset + 8 > data.len() {
                break;
            }

            let entry_size = read_u32_be(&data[offset..offset + 4])? as usize;
            let entry_type = [
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ];

            if entry_size < 16 || offset + entry_size > data.len() {
                break;
            }

            let entry_data = &data[offset..offset + entry_size];

            let entry = match &entry_type {
                b"avc1" | b"avc3" | b"hev1" | b"hvc1" | b"vp08" | b"vp09" | b"av01" => {
                    Self::parse_video_entry(entry_data)?
                }
                b"mp4a" | b"Opus" => Self::parse_audio_entry(entry_data)?,
                _ => SampleEntry {
                    entry_type,
                    width: 0,
                    height: 0,
                    sample_rate: 0,
                    channel_count: 0,
                    codec_data: entry_data[16..].to_vec(),
                },
            };

            entries.push(entry);
            offset += entry_size;
        }

        Ok(entries)
    }

    fn parse_video_entry(data: &[u8]) -> Result<SampleEntry> {
        if data.len() < 78 {
            return Err(ContainerError::from("video sample entry too short").into());
        }

        Ok(SampleEntry {
            entry_type: [data[4], data[5], data[6], data[7]],
            width: u16::from_be_bytes([data[32], data[33]]),
            height: u16::from_be_bytes([data[34], data[35]]),
            sample_rate: 0,
            channel_count: 0,
            // Child atoms (avcC and friends) start at offset 86.
            codec_data: if data.len() > 86 {
                data[86..].to_vec()
            } else {
                Vec::new()
            },
        })
    }

    fn parse_audio_entry(data: &[u8]) -> Result<SampleEntry> {
        if data.len() < 36 {
            return Err(ContainerError::from("audio sample entry too short").into());
        }

        Ok(SampleEntry {
            entry_type: [data[4], data[5], data[6], data[7]],
            width: 0,
            height: 0,
            channel_count: u16::from_be_bytes([data[24], data[25]]),
            sample_rate: read_u32_be(&data[32..36])?,
            codec_data: if data.len() > 36 {
                data[36..].to_vec()
            } else {
                Vec::new()
            },
        })
    }

    fn parse_stsz(data: &[u8]) -> Result<Vec<u32>> {
        if data.len() < 12 {
            return Err(ContainerError::from("stsz too short").into());
        }

        let sample_size = read_u32_be(&data[4..8])?;
        let sample_count = read_u32_be(&data[8..12])? as usize;

        if sample_size != 0 {
            // Constant size table; the count is not backed by bytes, so
            // cap it on its own.
            return Ok(vec![sample_size; sample_count.min(MAX_TABLE_ENTRIES)]);
        }

        let mut sizes = Vec::with_capacity(capped_capacity(sample_count, data.len() - 12, 4));
        let mut offset = 12;
        for _ in 0..sample_count {
            if offset + 4 > data.len() {
                break;
            }
            sizes.push(read_u32_be(&data[offset..offset + 4])?);
            offset += 4;
        }
        Ok(sizes)
    }

    fn parse_stsc(data: &[u8]) -> Result<Vec<(u32, u32, u32)>> {
        if data.len() < 8 {
            return Err(ContainerError::from("stsc too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut entries = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 12));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 12 > data.len() {
                break;
            }
            entries.push((
                read_u32_be(&data[offset..offset + 4])?,
                read_u32_be(&data[offset + 4..offset + 8])?,
                read_u32_be(&data[offset + 8..offset + 12])?,
            ));
            offset += 12;
        }
        Ok(entries)
    }

    fn parse_stco(data: &[u8]) -> Result<Vec<u64>> {
        if data.len() < 8 {
            return Err(ContainerError::from("stco too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut offsets = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 4));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 4 > data.len() {
                break;
            }
            offsets.push(read_u32_be(&data[offset..offset + 4])? as u64);
            offset += 4;
        }
        Ok(offsets)
    }

    fn parse_co64(data: &[u8]) -> Result<Vec<u64>> {
        if data.len() < 8 {
            return Err(ContainerError::from("co64 too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut offsets = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 8));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 8 > data.len() {
                break;
            }
            offsets.push(read_u64_be(&data[offset..offset + 8])?);
            offset += 8;
        }
        Ok(offsets)
    }

    fn parse_stts(data: &[u8]) -> Result<Vec<(u32, u32)>> {
        if data.len() < 8 {
            return Err(ContainerError::from("stts too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut entries = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 8));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 8 > data.len() {
                break;
            }
            entries.push((
                read_u32_be(&data[offset..offset + 4])?,
                read_u32_be(&data[offset + 4..offset + 8])?,
            ));
            offset += 8;
        }
        Ok(entries)
    }

    fn parse_ctts(data: &[u8]) -> Result<Vec<(u32, i32)>> {
        if data.len() < 8 {
            return Err(ContainerError::from("ctts too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut entries = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 8));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 8 > data.len() {
                break;
            }
            entries.push((
                read_u32_be(&data[offset..offset + 4])?,
                read_u32_be(&data[offset + 4..offset + 8])? as i32,
            ));
            offset += 8;
        }
        Ok(entries)
    }

    fn parse_stss(data: &[u8]) -> Result<Vec<u32>> {
        if data.len() < 8 {
            return Err(ContainerError::from("stss too short").into());
        }

        let entry_count = read_u32_be(&data[4..8])? as usize;
        let mut entries = Vec::with_capacity(capped_capacity(entry_count, data.len() - 8, 4));
        let mut offset = 8;
        for _ in 0..entry_count {
            if offset + 4 > data.len() {
                break;
            }
            entries.push(read_u32_be(&data[offset..offset + 4])?);
            offset += 4;
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_atom_header_read() {
        let mut buf = 100u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"moov");

        let read = AtomHeader::read(&mut Cursor::new(&buf)).unwrap().unwrap();
        assert_eq!(&read.atom_type, b"moov");
        assert_eq!(read.size, 100);
        assert_eq!(read.header_size, 8);
    }

    #[test]
    fn test_atom_header_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(AtomHeader::read(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_atom_undersized() {
        let mut data = 4u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"free");
        assert!(AtomHeader::read(&mut Cursor::new(&data)).is_err());
    }

    #[test]
    fn test_oversized_content_rejected() {
        // Declares 1 GiB of content that is not in the buffer.
        let mut data = 0x4000_0008u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"mdat");
        let header = AtomHeader::read(&mut Cursor::new(&data)).unwrap().unwrap();
        assert!(header.read_content(&mut Cursor::new(&data)).is_err());
    }

    #[test]
    fn test_tkhd_rotation_matrix() {
        const ONE: i32 = 0x0001_0000;
        let degrees = |matrix| TkhdAtom { matrix }.rotation_degrees();

        assert_eq!(degrees([ONE, 0, 0, ONE]), 0);
        assert_eq!(degrees([0, ONE, -ONE, 0]), 90);
        assert_eq!(degrees([-ONE, 0, 0, -ONE]), 180);
        assert_eq!(degrees([0, -ONE, ONE, 0]), 270);
    }

    #[test]
    fn test_elst_media_time_offset() {
        // version 0, two entries: an empty edit then a real one.
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&500u32.to_be_bytes());
        data.extend_from_slice(&(-1i32).to_be_bytes());
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        data.extend_from_slice(&9000u32.to_be_bytes());
        data.extend_from_slice(&1024i32.to_be_bytes());
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());

        let elst = ElstAtom::parse(&data).unwrap();
        assert_eq!(elst.entries.len(), 2);
        assert_eq!(elst.entries[0].media_time, -1);
        assert_eq!(elst.media_time_offset(), 1024);
    }

    #[test]
    fn test_stsz_huge_count_capped() {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&u32::MAX.to_be_bytes());
        // No backing bytes; the parser must not allocate for the count.
        let sizes = StblInfo::parse_stsz(&data).unwrap();
        assert!(sizes.is_empty());
    }
}
