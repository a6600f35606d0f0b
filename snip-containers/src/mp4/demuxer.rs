//! MP4 demuxer.

use super::atoms::{AtomHeader, ElstAtom, HdlrAtom, MdhdAtom, MvhdAtom, StblInfo, TkhdAtom};
use crate::traits::{
    AudioTrackMetadata, CodecId, Rotation, TrackKind, TrackMetadata, VideoTrackMetadata,
};
use snip_core::time::{ticks_to_us, TimeRange};
use snip_core::{ChunkKind, ContainerError, EncodedChunk, Result};
use std::io::{Cursor, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, trace};

/// Maximum size for a single coded sample (50 MB). Individual
/// video/audio samples never legitimately exceed this.
const MAX_SAMPLE_SIZE: u32 = 50 * 1024 * 1024;

/// One sample resolved against the file: where it lives and when it
/// plays.
#[derive(Debug, Clone, Copy)]
struct SampleSpan {
    offset: u64,
    size: u32,
    /// Presentation time in microseconds, edit-list corrected.
    pts_us: i64,
    duration_us: i64,
    is_sync: bool,
}

/// Parsed per-track state.
#[derive(Debug)]
struct TrackState {
    meta: TrackMetadata,
    stbl: StblInfo,
    timescale: u32,
    /// elst media-time offset in media timescale units.
    media_time_offset: i64,
}

impl TrackState {
    /// Resolve every sample to a file span with corrected timestamps.
    /// Samples come out in decode order.
    fn build_spans(&self) -> Vec<SampleSpan> {
        let sample_count = self.stbl.sample_count();
        let mut spans = Vec::with_capacity(sample_count);

        // Per-sample decode deltas from stts.
        let mut deltas = Vec::with_capacity(sample_count);
        for &(count, delta) in &self.stbl.stts {
            for _ in 0..count {
                if deltas.len() == sample_count {
                    break;
                }
                deltas.push(delta);
            }
        }
        deltas.resize(sample_count, deltas.last().copied().unwrap_or(0));

        // Per-sample composition offsets from ctts.
        let mut comp = vec![0i32; sample_count];
        let mut idx = 0usize;
        for &(count, offset) in &self.stbl.ctts {
            for _ in 0..count {
                if idx >= sample_count {
                    break;
                }
                comp[idx] = offset;
                idx += 1;
            }
        }

        // Walk stsc chunk runs to recover byte offsets.
        let chunk_count = self.stbl.chunk_offsets.len();
        let mut sample_idx = 0usize;
        let mut dts: i64 = 0;

        'outer: for (i, &(first_chunk, samples_per_chunk, _)) in self.stbl.stsc.iter().enumerate() {
            let next_first = self
                .stbl
                .stsc
                .get(i + 1)
                .map(|e| e.0)
                .unwrap_or((chunk_count as u32).saturating_add(1));

            for chunk in first_chunk..next_first {
                let Some(&chunk_offset) = self.stbl.chunk_offsets.get(chunk as usize - 1) else {
                    break 'outer;
                };
                let mut offset = chunk_offset;

                for _ in 0..samples_per_chunk {
                    if sample_idx >= sample_count {
                        break 'outer;
                    }
                    let size = self.stbl.sample_sizes[sample_idx];
                    let delta = deltas[sample_idx] as i64;
                    let pts_ticks = dts
                        .saturating_add(comp[sample_idx] as i64)
                        .saturating_sub(self.media_time_offset);

                    spans.push(SampleSpan {
                        offset,
                        size,
                        pts_us: ticks_to_us(pts_ticks, self.timescale),
                        duration_us: ticks_to_us(delta, self.timescale),
                        is_sync: self.is_sync_sample(sample_idx),
                    });

                    offset = offset.saturating_add(size as u64);
                    dts = dts.saturating_add(delta);
                    sample_idx += 1;
                }
            }
        }

        spans
    }

    fn is_sync_sample(&self, sample_idx: usize) -> bool {
        if self.stbl.stss.is_empty() {
            // No sync table: every sample syncs.
            true
        } else {
            self.stbl.stss.contains(&(sample_idx as u32 + 1))
        }
    }
}

/// Pull-style stream of coded chunks for one track, clipped to a
/// requested window.
///
/// Holds its own handle on the file bytes, so streams for different
/// tracks advance independently.
pub struct ChunkStream {
    data: Arc<[u8]>,
    spans: Vec<SampleSpan>,
    next: usize,
    /// Total payload bytes this run will emit. Reaching it ends the
    /// stream regardless of the sample cursor.
    planned_bytes: u64,
    emitted_bytes: u64,
    stopped: bool,
}

impl ChunkStream {
    /// Pull the next chunk in decode order. `Ok(None)` once the run is
    /// exhausted or stopped.
    pub fn next_chunk(&mut self) -> Result<Option<EncodedChunk>> {
        if self.stopped {
            return Ok(None);
        }
        // The byte count is authoritative; the cursor check backs it up
        // when sizes in the sample table disagree with the plan.
        if self.emitted_bytes >= self.planned_bytes || self.next >= self.spans.len() {
            self.stopped = true;
            return Ok(None);
        }

        let span = self.spans[self.next];
        self.next += 1;

        if span.size > MAX_SAMPLE_SIZE {
            return Err(ContainerError::InvalidSize {
                offset: span.offset,
                message: format!("sample size {} exceeds limit {}", span.size, MAX_SAMPLE_SIZE),
            }
            .into());
        }

        let start = span.offset as usize;
        let end = start.saturating_add(span.size as usize);
        if end > self.data.len() {
            return Err(ContainerError::InvalidSize {
                offset: span.offset,
                message: "sample extends past end of file".into(),
            }
            .into());
        }

        self.emitted_bytes += span.size as u64;

        let kind = if span.is_sync {
            ChunkKind::Key
        } else {
            ChunkKind::Delta
        };
        let chunk = EncodedChunk {
            kind,
            timestamp_us: span.pts_us,
            duration_us: span.duration_us,
            data: self.data[start..end].to_vec(),
            coded_size: None,
            color: Default::default(),
        };
        trace!(
            pts_us = span.pts_us,
            size = span.size,
            key = span.is_sync,
            "demuxed chunk"
        );
        Ok(Some(chunk))
    }

    /// Stop the stream. Idempotent; later pulls return `Ok(None)`.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Number of chunks this run covers.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Presentation time of the first chunk in the run.
    pub fn first_timestamp_us(&self) -> Option<i64> {
        self.spans.first().map(|s| s.pts_us)
    }
}

/// MP4 demuxer over an in-memory file.
pub struct Mp4Demuxer {
    data: Arc<[u8]>,
    tracks: Vec<TrackState>,
    duration_us: i64,
}

impl Mp4Demuxer {
    /// Parse the file structure. Reads only `ftyp`/`moov`; media data
    /// is touched lazily by [`ChunkStream`].
    pub fn open(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data: Arc<[u8]> = data.into();
        let mut demuxer = Self {
            data: Arc::clone(&data),
            tracks: Vec::new(),
            duration_us: 0,
        };

        let mut reader = Cursor::new(&data[..]);
        let mut moov_headers = Vec::new();

        while let Some(header) = AtomHeader::read(&mut reader)? {
            match &header.atom_type {
                b"moov" => {
                    moov_headers.push(header.clone());
                    reader.seek(SeekFrom::Start(header.offset + header.size))?;
                }
                _ => {
                    reader.seek(SeekFrom::Start(header.offset + header.size))?;
                }
            }
        }

        if moov_headers.is_empty() {
            return Err(ContainerError::MissingElement("moov").into());
        }
        for moov in moov_headers {
            demuxer.parse_moov(&mut reader, &moov)?;
        }

        debug!(
            tracks = demuxer.tracks.len(),
            duration_us = demuxer.duration_us,
            "parsed mp4"
        );
        Ok(demuxer)
    }

    fn parse_moov(&mut self, reader: &mut Cursor<&[u8]>, moov: &AtomHeader) -> Result<()> {
        let end = moov.offset + moov.size;
        reader.seek(SeekFrom::Start(moov.offset + moov.header_size as u64))?;

        let mut trak_headers = Vec::new();

        while reader.stream_position()? < end {
            let Some(header) = AtomHeader::read(reader)? else {
                break;
            };

            match &header.atom_type {
                b"mvhd" => {
                    let content = header.read_content(reader)?;
                    let mvhd = MvhdAtom::parse(&content)?;
                    self.duration_us = ticks_to_us(mvhd.duration as i64, mvhd.timescale);
                }
                b"trak" => {
                    trak_headers.push(header.clone());
                    reader.seek(SeekFrom::Start(header.offset + header.size))?;
                }
                _ => {
                    reader.seek(SeekFrom::Start(header.offset + header.size))?;
                }
            }
        }

        for trak in trak_headers {
            self.parse_trak(reader, &trak)?;
        }
        Ok(())
    }

    fn parse_trak(&mut self, reader: &mut Cursor<&[u8]>, trak: &AtomHeader) -> Result<()> {
        let end = trak.offset + trak.size;
        reader.seek(SeekFrom::Start(trak.offset + trak.header_size as u64))?;

        let mut tkhd: Option<TkhdAtom> = None;
        let mut mdhd: Option<MdhdAtom> = None;
        let mut hdlr: Option<HdlrAtom> = None;
        let mut stbl: Option<StblInfo> = None;
        let mut elst: Option<ElstAtom> = None;

        while reader.stream_position()? < end {
            let Some(header) = AtomHeader::read(reader)? else {
                break;
            };

            match &header.atom_type {
                b"tkhd" => {
                    let content = header.read_content(reader)?;
                    tkhd = Some(TkhdAtom::parse(&content)?);
                }
                b"edts" => {
                    let edts_end = header.offset + header.size;
                    while reader.stream_position()? < edts_end {
                        let Some(child) = AtomHeader::read(reader)? else {
                            break;
                        };
                        if &child.atom_type == b"elst" {
                            let content = child.read_content(reader)?;
                            elst = Some(ElstAtom::parse(&content)?);
                        } else {
                            reader.seek(SeekFrom::Start(child.offset + child.size))?;
                        }
                    }
                }
                b"mdia" => {
                    let mdia_end = header.offset + header.size;
                    while reader.stream_position()? < mdia_end {
                        let Some(child) = AtomHeader::read(reader)? else {
                            break;
                        };
                        match &child.atom_type {
                            b"mdhd" => {
                                let content = child.read_content(reader)?;
                                mdhd = Some(MdhdAtom::parse(&content)?);
                            }
                            b"hdlr" => {
                                let content = child.read_content(reader)?;
                                hdlr = Some(HdlrAtom::parse(&content)?);
                            }
                            b"minf" => {
                                let minf_end = child.offset + child.size;
                                while reader.stream_position()? < minf_end {
                                    let Some(minf_atom) = AtomHeader::read(reader)? else {
                                        break;
                                    };
                                    if &minf_atom.atom_type == b"stbl" {
                                        stbl = Some(StblInfo::parse(
                                            reader,
                                            minf_atom.content_size(),
                                        )?);
                                    } else {
                                        reader.seek(SeekFrom::Start(
                                            minf_atom.offset + minf_atom.size,
                                        ))?;
                                    }
                                }
                            }
                            _ => {
                                reader.seek(SeekFrom::Start(child.offset + child.size))?;
                            }
                        }
                    }
                }
                _ => {
                    reader.seek(SeekFrom::Start(header.offset + header.size))?;
                }
            }
        }

        let (Some(tkhd), Some(mdhd), Some(hdlr), Some(stbl)) = (tkhd, mdhd, hdlr, stbl) else {
            // Not a media track we can read (text, hint, ...). Skip.
            return Ok(());
        };
        if stbl.sample_count() == 0 {
            return Ok(());
        }

        let Some(entry) = stbl.sample_entries.first() else {
            return Ok(());
        };
        let codec = CodecId::from_sample_entry(&entry.entry_type);
        let duration_us = ticks_to_us(mdhd.duration as i64, mdhd.timescale);
        let codec_config = extract_codec_config(&entry.codec_data);

        let meta = if hdlr.is_video() {
            TrackMetadata::Video(VideoTrackMetadata {
                codec,
                codec_config,
                width: entry.width as u32,
                height: entry.height as u32,
                rotation: Rotation::from_degrees(tkhd.rotation_degrees()),
                duration_us,
                frame_rate: derive_frame_rate(&stbl, mdhd.timescale),
            })
        } else if hdlr.is_audio() {
            TrackMetadata::Audio(AudioTrackMetadata {
                codec,
                codec_config,
                sample_rate: entry.sample_rate >> 16,
                channels: entry.channel_count as u32,
                duration_us,
            })
        } else {
            return Ok(());
        };

        self.tracks.push(TrackState {
            meta,
            stbl,
            timescale: mdhd.timescale,
            media_time_offset: elst.map_or(0, |e| e.media_time_offset()),
        });
        Ok(())
    }

    /// Per-track metadata, in file order.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackMetadata> {
        self.tracks.iter().map(|t| &t.meta)
    }

    pub fn track(&self, index: usize) -> Option<&TrackMetadata> {
        self.tracks.get(index).map(|t| &t.meta)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Longest track duration in microseconds, falling back to the
    /// movie header when tracks carry none.
    pub fn duration_us(&self) -> i64 {
        self.tracks
            .iter()
            .map(|t| t.meta.duration_us())
            .max()
            .filter(|&d| d > 0)
            .unwrap_or(self.duration_us)
    }

    /// Open a clipped chunk stream for one track.
    ///
    /// Video runs start at the nearest sync sample at or before the
    /// window start, so a decoder can reconstruct the first wanted
    /// frame. The run ends at the earlier of the planned byte total or
    /// the first sync sample past the window end.
    pub fn chunk_stream(&self, track_index: usize, window: TimeRange) -> Result<ChunkStream> {
        let track = self
            .tracks
            .get(track_index)
            .ok_or(ContainerError::TrackNotFound {
                index: track_index,
            })?;

        let spans = track.build_spans();
        let is_video = track.meta.kind() == TrackKind::Video;

        // First sample whose span reaches into the window.
        let mut start = spans
            .iter()
            .position(|s| s.pts_us + s.duration_us > window.start_us)
            .unwrap_or(spans.len());

        if is_video {
            // Step back to a sync sample the decoder can start from.
            while start > 0 && start < spans.len() && !spans[start].is_sync {
                start -= 1;
            }
        }

        // One past the last wanted sample. For video, extend to the
        // next sync sample so the tail of the window stays decodable.
        let mut end = spans[start..]
            .iter()
            .position(|s| s.pts_us >= window.end_us)
            .map(|p| start + p)
            .unwrap_or(spans.len());
        if is_video {
            while end < spans.len() && !spans[end].is_sync && spans[end].pts_us < window.end_us {
                end += 1;
            }
        }

        let run: Vec<SampleSpan> = spans[start..end].to_vec();
        let planned_bytes = run.iter().map(|s| s.size as u64).sum();

        debug!(
            track = track_index,
            samples = run.len(),
            planned_bytes,
            "selected chunk run"
        );

        Ok(ChunkStream {
            data: Arc::clone(&self.data),
            spans: run,
            next: 0,
            planned_bytes,
            emitted_bytes: 0,
            stopped: false,
        })
    }
}

/// Pull a known decoder-config child atom out of a sample entry's
/// trailing atoms.
fn extract_codec_config(codec_data: &[u8]) -> Option<Vec<u8>> {
    let mut offset = 0usize;
    while offset + 8 <= codec_data.len() {
        let size = u32::from_be_bytes([
            codec_data[offset],
            codec_data[offset + 1],
            codec_data[offset + 2],
            codec_data[offset + 3],
        ]) as usize;
        if size < 8 || offset + size > codec_data.len() {
            return None;
        }
        let atom_type = &codec_data[offset + 4..offset + 8];
        match atom_type {
            b"avcC" | b"hvcC" | b"av1C" | b"vpcC" | b"esds" | b"dOps" => {
                return Some(codec_data[offset + 8..offset + size].to_vec());
            }
            _ => offset += size,
        }
    }
    None
}

/// Average frame rate from the dominant stts delta.
fn derive_frame_rate(stbl: &StblInfo, timescale: u32) -> Option<f64> {
    let &(_, delta) = stbl.stts.iter().max_by_key(|&&(count, _)| count)?;
    if delta == 0 || timescale == 0 {
        return None;
    }
    Some(timescale as f64 / delta as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_track(stbl: StblInfo, timescale: u32, media_time_offset: i64) -> TrackState {
        TrackState {
            meta: TrackMetadata::Video(VideoTrackMetadata {
                codec: CodecId::H264,
                codec_config: None,
                width: 64,
                height: 64,
                rotation: Rotation::R0,
                duration_us: 0,
                frame_rate: None,
            }),
            stbl,
            timescale,
            media_time_offset,
        }
    }

    /// Five samples of 10 bytes each, one chunk, 100 ticks apart at
    /// timescale 1000 (so 100ms apart). Samples 1 and 4 are sync.
    fn test_stbl() -> StblInfo {
        StblInfo {
            sample_entries: Vec::new(),
            sample_sizes: vec![10; 5],
            stsc: vec![(1, 5, 1)],
            chunk_offsets: vec![1000],
            stts: vec![(5, 100)],
            ctts: Vec::new(),
            stss: vec![1, 4],
        }
    }

    #[test]
    fn test_span_offsets_and_timestamps() {
        let track = test_track(test_stbl(), 1000, 0);
        let spans = track.build_spans();
        assert_eq!(spans.len(), 5);
        assert_eq!(spans[0].offset, 1000);
        assert_eq!(spans[1].offset, 1010);
        assert_eq!(spans[0].pts_us, 0);
        assert_eq!(spans[1].pts_us, 100_000);
        assert_eq!(spans[4].pts_us, 400_000);
        assert_eq!(spans[0].duration_us, 100_000);
        assert!(spans[0].is_sync);
        assert!(!spans[1].is_sync);
        assert!(spans[3].is_sync);
    }

    #[test]
    fn test_edit_list_offset_applied() {
        // Media time offset of 50 ticks shifts everything back 50ms.
        let track = test_track(test_stbl(), 1000, 50);
        let spans = track.build_spans();
        assert_eq!(spans[0].pts_us, -50_000);
        assert_eq!(spans[1].pts_us, 50_000);
    }

    #[test]
    fn test_composition_offsets() {
        let mut stbl = test_stbl();
        stbl.ctts = vec![(5, 200)];
        let track = test_track(stbl, 1000, 0);
        let spans = track.build_spans();
        assert_eq!(spans[0].pts_us, 200_000);
        assert_eq!(spans[1].pts_us, 300_000);
    }

    #[test]
    fn test_multi_chunk_offsets() {
        // Two chunks: 3 samples then 2 samples.
        let mut stbl = test_stbl();
        stbl.stsc = vec![(1, 3, 1), (2, 2, 1)];
        stbl.chunk_offsets = vec![1000, 2000];
        let track = test_track(stbl, 1000, 0);
        let spans = track.build_spans();
        assert_eq!(spans[2].offset, 1020);
        assert_eq!(spans[3].offset, 2000);
        assert_eq!(spans[4].offset, 2010);
    }

    fn stream_over(track: &TrackState, data: Vec<u8>, window: TimeRange) -> ChunkStream {
        let mut demuxer = Mp4Demuxer {
            data: data.into(),
            tracks: Vec::new(),
            duration_us: 0,
        };
        demuxer.tracks.push(TrackState {
            meta: track.meta.clone(),
            stbl: track.stbl.clone(),
            timescale: track.timescale,
            media_time_offset: track.media_time_offset,
        });
        demuxer.chunk_stream(0, window).unwrap()
    }

    #[test]
    fn test_window_starts_at_sync_sample() {
        let track = test_track(test_stbl(), 1000, 0);
        let data = vec![0u8; 2048];
        // Window starts mid-GOP at 250ms; the run must back up to the
        // sync sample at 0.
        let mut stream = stream_over(&track, data, TimeRange::new(250_000, 500_000));
        let first = stream.next_chunk().unwrap().unwrap();
        assert_eq!(first.timestamp_us, 0);
        assert_eq!(first.kind, ChunkKind::Key);
    }

    #[test]
    fn test_byte_count_ends_stream() {
        let track = test_track(test_stbl(), 1000, 0);
        let data = vec![0u8; 2048];
        let mut stream = stream_over(&track, data, TimeRange::new(0, 500_000));
        assert_eq!(stream.len(), 5);
        let mut count = 0;
        while stream.next_chunk().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
        // Exhausted stream keeps returning None.
        assert!(stream.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let track = test_track(test_stbl(), 1000, 0);
        let data = vec![0u8; 2048];
        let mut stream = stream_over(&track, data, TimeRange::new(0, 500_000));
        stream.stop();
        stream.stop();
        assert!(stream.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_sample_past_file_end_rejected() {
        let track = test_track(test_stbl(), 1000, 0);
        // Chunk offsets point at byte 1000 but the file is shorter.
        let data = vec![0u8; 100];
        let mut stream = stream_over(&track, data, TimeRange::new(0, 500_000));
        assert!(stream.next_chunk().is_err());
    }

    #[test]
    fn test_frame_rate_derivation() {
        let stbl = test_stbl();
        assert_eq!(derive_frame_rate(&stbl, 1000), Some(10.0));
    }

    #[test]
    fn test_extract_codec_config() {
        let mut data = Vec::new();
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(b"avcC");
        data.extend_from_slice(&[1, 2, 3, 4]);
        assert_eq!(extract_codec_config(&data), Some(vec![1, 2, 3, 4]));
        assert_eq!(extract_codec_config(&[0, 0]), None);
    }
}
