//! MP4 muxer.

use super::{write_u32_be, write_u64_be};
use crate::traits::{
    AudioTrackMetadata, CodecId, Muxer, Rotation, TrackKind, VideoTrackMetadata,
};
use snip_core::time::us_to_ticks;
use snip_core::{ContainerError, EncodedChunk, Result};
use std::io::{Cursor, Seek, SeekFrom, Write};
use tracing::debug;

/// Samples per interleave chunk in the output sample table.
const SAMPLES_PER_CHUNK: usize = 10;

/// Video track timescale. High enough that microsecond timestamps
/// survive the round trip within a tick.
const VIDEO_TIMESCALE: u32 = 90_000;

#[derive(Debug, Clone)]
struct SampleInfo {
    size: u32,
    /// Duration in track timescale units.
    duration: u32,
    keyframe: bool,
}

#[derive(Debug, Clone)]
struct ChunkInfo {
    offset: u64,
    sample_count: usize,
}

struct TrackState {
    kind: TrackKind,
    codec: CodecId,
    codec_config: Option<Vec<u8>>,
    width: u32,
    height: u32,
    rotation: Rotation,
    sample_rate: u32,
    channels: u32,
    timescale: u32,
    /// Edit-list media time in timescale units, when requested.
    edit_media_time: Option<i64>,
    samples: Vec<SampleInfo>,
    chunks: Vec<ChunkInfo>,
    current_chunk_samples: usize,
    current_chunk_offset: u64,
    /// Total duration in timescale units.
    duration: u64,
}

impl TrackState {
    fn video(meta: &VideoTrackMetadata) -> Self {
        Self {
            kind: TrackKind::Video,
            codec: meta.codec,
            codec_config: meta.codec_config.clone(),
            width: meta.width,
            height: meta.height,
            rotation: meta.rotation,
            sample_rate: 0,
            channels: 0,
            timescale: VIDEO_TIMESCALE,
            edit_media_time: None,
            samples: Vec::new(),
            chunks: Vec::new(),
            current_chunk_samples: 0,
            current_chunk_offset: 0,
            duration: 0,
        }
    }

    fn audio(meta: &AudioTrackMetadata) -> Self {
        Self {
            kind: TrackKind::Audio,
            codec: meta.codec,
            codec_config: meta.codec_config.clone(),
            width: 0,
            height: 0,
            rotation: Rotation::R0,
            sample_rate: meta.sample_rate,
            channels: meta.channels,
            timescale: meta.sample_rate.max(1),
            edit_media_time: None,
            samples: Vec::new(),
            chunks: Vec::new(),
            current_chunk_samples: 0,
            current_chunk_offset: 0,
            duration: 0,
        }
    }
}

/// MP4 muxer writing into an in-memory buffer.
pub struct Mp4Muxer {
    buffer: Cursor<Vec<u8>>,
    tracks: Vec<TrackState>,
    mdat_start: u64,
    header_written: bool,
}

impl Mp4Muxer {
    pub fn new() -> Self {
        Self {
            buffer: Cursor::new(Vec::new()),
            tracks: Vec::new(),
            mdat_start: 0,
            header_written: false,
        }
    }

    /// Request an edit list on a registered track, expressed as the
    /// media time (in timescale units) where presentation begins.
    pub fn set_edit_media_time(&mut self, track_id: u32, media_time: i64) -> Result<()> {
        let track = self
            .tracks
            .get_mut(track_id as usize)
            .ok_or(ContainerError::TrackNotFound {
                index: track_id as usize,
            })?;
        track.edit_media_time = Some(media_time);
        Ok(())
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.write_ftyp()?;
        self.start_mdat()?;
        self.header_written = true;
        Ok(())
    }

    fn write_ftyp(&mut self) -> Result<()> {
        let mut compatible: Vec<[u8; 4]> = vec![*b"isom", *b"iso2", *b"mp41"];
        if self.tracks.iter().any(|t| t.codec == CodecId::H264) {
            compatible.push(*b"avc1");
        }

        let size = 16 + compatible.len() * 4;
        self.buffer.write_all(&write_u32_be(size as u32))?;
        self.buffer.write_all(b"ftyp")?;
        self.buffer.write_all(b"isom")?;
        self.buffer.write_all(&write_u32_be(0x200))?;
        for brand in compatible {
            self.buffer.write_all(&brand)?;
        }
        Ok(())
    }

    fn start_mdat(&mut self) -> Result<()> {
        self.mdat_start = self.buffer.stream_position()?;
        // size = 1 marks extended size; patched in finalize.
        self.buffer.write_all(&[0, 0, 0, 1])?;
        self.buffer.write_all(b"mdat")?;
        self.buffer.write_all(&[0u8; 8])?;
        Ok(())
    }

    fn finish_mdat(&mut self) -> Result<()> {
        let current = self.buffer.stream_position()?;
        let mdat_size = current - self.mdat_start;
        self.buffer.seek(SeekFrom::Start(self.mdat_start + 8))?;
        self.buffer.write_all(&write_u64_be(mdat_size))?;
        self.buffer.seek(SeekFrom::Start(current))?;
        Ok(())
    }

    fn build_moov(&self) -> Result<Vec<u8>> {
        let movie_timescale = 1000u32;
        let max_duration = self
            .tracks
            .iter()
            .map(|t| t.duration * movie_timescale as u64 / t.timescale.max(1) as u64)
            .max()
            .unwrap_or(0);

        let mut moov = Vec::new();
        moov.extend_from_slice(&self.build_mvhd(movie_timescale, max_duration));
        for (i, track) in self.tracks.iter().enumerate() {
            moov.extend_from_slice(&self.build_trak(track, i as u32 + 1, movie_timescale)?);
        }

        Ok(wrap_atom(b"moov", &moov))
    }

    fn build_mvhd(&self, timescale: u32, duration: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(112);
        data.extend_from_slice(&[0, 0, 0, 0]); // version and flags
        data.extend_from_slice(&write_u32_be(0)); // creation time
        data.extend_from_slice(&write_u32_be(0)); // modification time
        data.extend_from_slice(&write_u32_be(timescale));
        data.extend_from_slice(&write_u32_be(duration as u32));
        data.extend_from_slice(&write_u32_be(0x0001_0000)); // rate 1.0
        data.extend_from_slice(&[0x01, 0x00]); // volume 1.0
        data.extend_from_slice(&[0u8; 10]); // reserved
        data.extend_from_slice(&identity_matrix());
        data.extend_from_slice(&[0u8; 24]); // pre-defined
        data.extend_from_slice(&write_u32_be(self.tracks.len() as u32 + 1));
        wrap_atom(b"mvhd", &data)
    }

    fn build_trak(&self, track: &TrackState, track_id: u32, movie_timescale: u32) -> Result<Vec<u8>> {
        let mut trak = Vec::new();
        trak.extend_from_slice(&self.build_tkhd(track, track_id, movie_timescale));
        if let Some(media_time) = track.edit_media_time {
            trak.extend_from_slice(&build_edts(track, media_time, movie_timescale));
        }
        trak.extend_from_slice(&self.build_mdia(track)?);
        Ok(wrap_atom(b"trak", &trak))
    }

    fn build_tkhd(&self, track: &TrackState, track_id: u32, movie_timescale: u32) -> Vec<u8> {
        let duration = track.duration * movie_timescale as u64 / track.timescale.max(1) as u64;

        let mut data = Vec::new();
        data.push(0); // version
        data.extend_from_slice(&[0, 0, 0x03]); // flags: enabled, in movie
        data.extend_from_slice(&write_u32_be(0)); // creation time
        data.extend_from_slice(&write_u32_be(0)); // modification time
        data.extend_from_slice(&write_u32_be(track_id));
        data.extend_from_slice(&[0u8; 4]); // reserved
        data.extend_from_slice(&write_u32_be(duration as u32));
        data.extend_from_slice(&[0u8; 8]); // reserved
        data.extend_from_slice(&[0u8; 4]); // layer and alternate group
        if track.kind == TrackKind::Audio {
            data.extend_from_slice(&[0x01, 0x00]); // volume 1.0
        } else {
            data.extend_from_slice(&[0, 0]);
        }
        data.extend_from_slice(&[0u8; 2]); // reserved
        data.extend_from_slice(&rotation_matrix(track.rotation));

        if track.kind == TrackKind::Video {
            data.extend_from_slice(&write_u32_be(track.width << 16));
            data.extend_from_slice(&write_u32_be(track.height << 16));
        } else {
            data.extend_from_slice(&[0u8; 8]);
        }

        wrap_atom(b"tkhd", &data)
    }

    fn build_mdia(&self, track: &TrackState) -> Result<Vec<u8>> {
        let mut mdia = Vec::new();
        mdia.extend_from_slice(&build_mdhd(track));
        mdia.extend_from_slice(&build_hdlr(track.kind));
        mdia.extend_from_slice(&self.build_minf(track)?);
        Ok(wrap_atom(b"mdia", &mdia))
    }

    fn build_minf(&self, track: &TrackState) -> Result<Vec<u8>> {
        let mut minf = Vec::new();
        if track.kind == TrackKind::Video {
            let mut vmhd = vec![0, 0, 0, 1];
            vmhd.extend_from_slice(&[0u8; 8]);
            minf.extend_from_slice(&wrap_atom(b"vmhd", &vmhd));
        } else {
            let mut smhd = vec![0, 0, 0, 0];
            smhd.extend_from_slice(&[0u8; 4]);
            minf.extend_from_slice(&wrap_atom(b"smhd", &smhd));
        }
        minf.extend_from_slice(&build_dinf());
        minf.extend_from_slice(&self.build_stbl(track)?);
        Ok(wrap_atom(b"minf", &minf))
    }

    fn build_stbl(&self, track: &TrackState) -> Result<Vec<u8>> {
        let mut stbl = Vec::new();
        stbl.extend_from_slice(&self.build_stsd(track)?);
        stbl.extend_from_slice(&build_stts(track));
        if track.kind == TrackKind::Video {
            stbl.extend_from_slice(&build_stss(track));
        }
        stbl.extend_from_slice(&build_stsc(track));
        stbl.extend_from_slice(&build_stsz(track));
        stbl.extend_from_slice(&build_stco(track));
        Ok(wrap_atom(b"stbl", &stbl))
    }

    fn build_stsd(&self, track: &TrackState) -> Result<Vec<u8>> {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(&write_u32_be(1)); // entry count
        let entry = match track.kind {
            TrackKind::Video => build_video_sample_entry(track)?,
            TrackKind::Audio => build_audio_sample_entry(track)?,
        };
        data.extend_from_slice(&entry);
        Ok(wrap_atom(b"stsd", &data))
    }
}

impl Default for Mp4Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for Mp4Muxer {
    fn add_video_track(&mut self, meta: &VideoTrackMetadata) -> Result<u32> {
        if self.header_written {
            return Err(ContainerError::from("cannot add tracks after first chunk").into());
        }
        if meta.codec.mp4_fourcc().is_none() {
            return Err(ContainerError::Other(format!(
                "codec {:?} cannot be written to mp4",
                meta.codec
            ))
            .into());
        }
        let id = self.tracks.len() as u32;
        self.tracks.push(TrackState::video(meta));
        Ok(id)
    }

    fn add_audio_track(&mut self, meta: &AudioTrackMetadata) -> Result<u32> {
        if self.header_written {
            return Err(ContainerError::from("cannot add tracks after first chunk").into());
        }
        if meta.codec.mp4_fourcc().is_none() {
            return Err(ContainerError::Other(format!(
                "codec {:?} cannot be written to mp4",
                meta.codec
            ))
            .into());
        }
        let id = self.tracks.len() as u32;
        self.tracks.push(TrackState::audio(meta));
        Ok(id)
    }

    fn write_chunk(&mut self, track_id: u32, chunk: &EncodedChunk) -> Result<()> {
        self.ensure_header()?;

        let offset = self.buffer.stream_position()?;
        self.buffer.write_all(&chunk.data)?;

        let track = self
            .tracks
            .get_mut(track_id as usize)
            .ok_or(ContainerError::TrackNotFound {
                index: track_id as usize,
            })?;

        let duration = us_to_ticks(chunk.duration_us, track.timescale).max(1) as u32;

        track.samples.push(SampleInfo {
            size: chunk.data.len() as u32,
            duration,
            keyframe: chunk.is_key(),
        });

        if track.current_chunk_samples == 0 || track.current_chunk_samples >= SAMPLES_PER_CHUNK {
            if track.current_chunk_samples > 0 {
                track.chunks.push(ChunkInfo {
                    offset: track.current_chunk_offset,
                    sample_count: track.current_chunk_samples,
                });
            }
            track.current_chunk_offset = offset;
            track.current_chunk_samples = 0;
        }
        track.current_chunk_samples += 1;
        track.duration += duration as u64;

        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<Vec<u8>> {
        self.ensure_header()?;

        for track in &mut self.tracks {
            if track.current_chunk_samples > 0 {
                track.chunks.push(ChunkInfo {
                    offset: track.current_chunk_offset,
                    sample_count: track.current_chunk_samples,
                });
                track.current_chunk_samples = 0;
            }
        }

        self.finish_mdat()?;
        let moov = self.build_moov()?;
        self.buffer.write_all(&moov)?;

        let bytes = self.buffer.into_inner();
        debug!(size = bytes.len(), tracks = self.tracks.len(), "finalized mp4");
        Ok(bytes)
    }

    fn mime_type(&self) -> &'static str {
        "video/mp4"
    }
}

fn wrap_atom(atom_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(content.len() + 8);
    result.extend_from_slice(&write_u32_be((content.len() + 8) as u32));
    result.extend_from_slice(atom_type);
    result.extend_from_slice(content);
    result
}

fn identity_matrix() -> Vec<u8> {
    rotation_matrix(Rotation::R0)
}

/// The 3x3 display matrix for a clockwise quarter-turn rotation, 16.16
/// fixed point, row major.
fn rotation_matrix(rotation: Rotation) -> Vec<u8> {
    const ONE: i32 = 0x0001_0000;
    const W: i32 = 0x4000_0000;
    let rows: [i32; 9] = match rotation {
        Rotation::R0 => [ONE, 0, 0, 0, ONE, 0, 0, 0, W],
        Rotation::R90 => [0, ONE, 0, -ONE, 0, 0, 0, 0, W],
        Rotation::R180 => [-ONE, 0, 0, 0, -ONE, 0, 0, 0, W],
        Rotation::R270 => [0, -ONE, 0, ONE, 0, 0, 0, 0, W],
    };
    let mut out = Vec::with_capacity(36);
    for v in rows {
        out.extend_from_slice(&(v as u32).to_be_bytes());
    }
    out
}

fn build_edts(track: &TrackState, media_time: i64, movie_timescale: u32) -> Vec<u8> {
    let segment_duration = track.duration * movie_timescale as u64 / track.timescale.max(1) as u64;

    let mut elst = vec![0, 0, 0, 0];
    elst.extend_from_slice(&write_u32_be(1)); // entry count
    elst.extend_from_slice(&write_u32_be(segment_duration as u32));
    elst.extend_from_slice(&(media_time as i32).to_be_bytes());
    elst.extend_from_slice(&write_u32_be(0x0001_0000)); // rate 1.0

    wrap_atom(b"edts", &wrap_atom(b"elst", &elst))
}

fn build_mdhd(track: &TrackState) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(0)); // creation time
    data.extend_from_slice(&write_u32_be(0)); // modification time
    data.extend_from_slice(&write_u32_be(track.timescale));
    data.extend_from_slice(&write_u32_be(track.duration as u32));
    data.extend_from_slice(&[0x55, 0xC4]); // language "und"
    data.extend_from_slice(&[0, 0]); // pre-defined
    wrap_atom(b"mdhd", &data)
}

fn build_hdlr(kind: TrackKind) -> Vec<u8> {
    let (handler_type, name): (&[u8; 4], &str) = match kind {
        TrackKind::Video => (b"vide", "VideoHandler"),
        TrackKind::Audio => (b"soun", "SoundHandler"),
    };

    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&[0u8; 4]); // pre-defined
    data.extend_from_slice(handler_type);
    data.extend_from_slice(&[0u8; 12]); // reserved
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    wrap_atom(b"hdlr", &data)
}

fn build_dinf() -> Vec<u8> {
    let mut dref = vec![0, 0, 0, 0];
    dref.extend_from_slice(&write_u32_be(1)); // entry count
    dref.extend_from_slice(&write_u32_be(12));
    dref.extend_from_slice(b"url ");
    dref.extend_from_slice(&[0, 0, 0, 1]); // self-contained
    wrap_atom(b"dinf", &wrap_atom(b"dref", &dref))
}

fn build_video_sample_entry(track: &TrackState) -> Result<Vec<u8>> {
    let fourcc = track
        .codec
        .mp4_fourcc()
        .ok_or_else(|| ContainerError::Other(format!("no mp4 fourcc for {:?}", track.codec)))?;

    let mut data = Vec::new();
    data.extend_from_slice(&[0u8; 6]); // reserved
    data.extend_from_slice(&[0, 1]); // data reference index
    data.extend_from_slice(&[0u8; 16]); // pre-defined and reserved
    data.extend_from_slice(&(track.width as u16).to_be_bytes());
    data.extend_from_slice(&(track.height as u16).to_be_bytes());
    data.extend_from_slice(&write_u32_be(0x0048_0000)); // horiz dpi
    data.extend_from_slice(&write_u32_be(0x0048_0000)); // vert dpi
    data.extend_from_slice(&[0u8; 4]); // reserved
    data.extend_from_slice(&[0, 1]); // frame count
    data.extend_from_slice(&[0u8; 32]); // compressor name
    data.extend_from_slice(&[0, 0x18]); // depth
    data.extend_from_slice(&[0xFF, 0xFF]); // pre-defined

    if let Some(ref config) = track.codec_config {
        let config_type: &[u8; 4] = match track.codec {
            CodecId::H264 => b"avcC",
            CodecId::Hevc => b"hvcC",
            CodecId::Av1 => b"av1C",
            CodecId::Vp9 => b"vpcC",
            _ => {
                return Err(ContainerError::Other(format!(
                    "no config box for {:?}",
                    track.codec
                ))
                .into())
            }
        };
        data.extend_from_slice(&wrap_atom(config_type, config));
    }

    Ok(wrap_atom(fourcc, &data))
}

fn build_audio_sample_entry(track: &TrackState) -> Result<Vec<u8>> {
    let fourcc = track
        .codec
        .mp4_fourcc()
        .ok_or_else(|| ContainerError::Other(format!("no mp4 fourcc for {:?}", track.codec)))?;

    let mut data = Vec::new();
    data.extend_from_slice(&[0u8; 6]); // reserved
    data.extend_from_slice(&[0, 1]); // data reference index
    data.extend_from_slice(&[0u8; 8]); // reserved
    data.extend_from_slice(&(track.channels as u16).to_be_bytes());
    data.extend_from_slice(&16u16.to_be_bytes()); // sample size
    data.extend_from_slice(&[0u8; 4]); // pre-defined and reserved
    data.extend_from_slice(&write_u32_be(track.sample_rate << 16));

    match track.codec {
        CodecId::Aac => data.extend_from_slice(&build_esds(track)),
        CodecId::Opus => {
            if let Some(ref config) = track.codec_config {
                data.extend_from_slice(&wrap_atom(b"dOps", config));
            }
        }
        _ => {}
    }

    Ok(wrap_atom(fourcc, &data))
}

fn build_esds(track: &TrackState) -> Vec<u8> {
    let empty = Vec::new();
    let config = track.codec_config.as_ref().unwrap_or(&empty);

    let mut data = vec![0, 0, 0, 0];

    data.push(0x03); // ES_DescrTag
    data.push((23 + config.len()) as u8);
    data.extend_from_slice(&[0, 1]); // ES_ID
    data.push(0); // flags

    data.push(0x04); // DecoderConfigDescrTag
    data.push((15 + config.len()) as u8);
    data.push(0x40); // objectTypeIndication: AAC
    data.push(0x15); // streamType: audio
    data.extend_from_slice(&[0, 0, 0]); // buffer size
    data.extend_from_slice(&write_u32_be(128_000)); // max bitrate
    data.extend_from_slice(&write_u32_be(128_000)); // avg bitrate

    data.push(0x05); // DecSpecificInfoTag
    data.push(config.len() as u8);
    data.extend_from_slice(config);

    data.push(0x06); // SLConfigDescrTag
    data.push(1);
    data.push(0x02);

    wrap_atom(b"esds", &data)
}

fn build_stts(track: &TrackState) -> Vec<u8> {
    let mut entries: Vec<(u32, u32)> = Vec::new();
    for sample in &track.samples {
        if let Some(last) = entries.last_mut() {
            if last.1 == sample.duration {
                last.0 += 1;
                continue;
            }
        }
        entries.push((1, sample.duration));
    }

    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(entries.len() as u32));
    for (count, delta) in entries {
        data.extend_from_slice(&write_u32_be(count));
        data.extend_from_slice(&write_u32_be(delta));
    }
    wrap_atom(b"stts", &data)
}

fn build_stss(track: &TrackState) -> Vec<u8> {
    let keyframes: Vec<u32> = track
        .samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.keyframe)
        .map(|(i, _)| i as u32 + 1)
        .collect();

    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(keyframes.len() as u32));
    for sample_num in keyframes {
        data.extend_from_slice(&write_u32_be(sample_num));
    }
    wrap_atom(b"stss", &data)
}

fn build_stsc(track: &TrackState) -> Vec<u8> {
    let mut entries: Vec<(u32, u32, u32)> = Vec::new();
    for (i, chunk) in track.chunks.iter().enumerate() {
        let samples_per_chunk = chunk.sample_count as u32;
        if entries.last().map(|e| e.1) != Some(samples_per_chunk) {
            entries.push((i as u32 + 1, samples_per_chunk, 1));
        }
    }

    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(entries.len() as u32));
    for (first_chunk, samples, desc_idx) in entries {
        data.extend_from_slice(&write_u32_be(first_chunk));
        data.extend_from_slice(&write_u32_be(samples));
        data.extend_from_slice(&write_u32_be(desc_idx));
    }
    wrap_atom(b"stsc", &data)
}

fn build_stsz(track: &TrackState) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(0)); // variable sizes
    data.extend_from_slice(&write_u32_be(track.samples.len() as u32));
    for sample in &track.samples {
        data.extend_from_slice(&write_u32_be(sample.size));
    }
    wrap_atom(b"stsz", &data)
}

fn build_stco(track: &TrackState) -> Vec<u8> {
    let use_64bit = track.chunks.iter().any(|c| c.offset > u32::MAX as u64);

    let mut data = vec![0, 0, 0, 0];
    data.extend_from_slice(&write_u32_be(track.chunks.len() as u32));
    for chunk in &track.chunks {
        if use_64bit {
            data.extend_from_slice(&write_u64_be(chunk.offset));
        } else {
            data.extend_from_slice(&write_u32_be(chunk.offset as u32));
        }
    }

    let box_type = if use_64bit { b"co64" } else { b"stco" };
    wrap_atom(box_type, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::chunk::EncodedChunk;

    fn video_meta() -> VideoTrackMetadata {
        VideoTrackMetadata {
            codec: CodecId::H264,
            codec_config: Some(vec![1, 100, 0, 31]),
            width: 320,
            height: 240,
            rotation: Rotation::R0,
            duration_us: 0,
            frame_rate: Some(30.0),
        }
    }

    #[test]
    fn test_starts_with_ftyp() {
        let mut muxer = Box::new(Mp4Muxer::new());
        let id = muxer.add_video_track(&video_meta()).unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::key(0, 33_333, vec![0xAA; 16]))
            .unwrap();
        let bytes = muxer.finalize().unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn test_rejects_unmappable_codec() {
        let mut muxer = Mp4Muxer::new();
        let mut meta = video_meta();
        meta.codec = CodecId::Vp8;
        assert!(muxer.add_video_track(&meta).is_err());
    }

    #[test]
    fn test_rotation_matrix_values() {
        let m = rotation_matrix(Rotation::R90);
        // First row is (0, 1.0) in 16.16.
        assert_eq!(&m[0..4], &[0, 0, 0, 0]);
        assert_eq!(&m[4..8], &0x0001_0000u32.to_be_bytes());
    }

    #[test]
    fn test_tracks_after_first_chunk_rejected() {
        let mut muxer = Mp4Muxer::new();
        let id = muxer.add_video_track(&video_meta()).unwrap();
        muxer
            .write_chunk(id, &EncodedChunk::key(0, 33_333, vec![0; 4]))
            .unwrap();
        assert!(muxer.add_video_track(&video_meta()).is_err());
    }
}
