//! The trim orchestrator.
//!
//! Opens the source, decides a per-track strategy, and cooperatively
//! interleaves one pipeline per track on a single thread:
//!
//! ```text
//! demuxer chunks -> [decode ->] extractor -> encode -> muxer adapter
//! ```
//!
//! Video always decodes and re-encodes, to correct rotation and honor
//! frame-granular window boundaries. Audio copies coded chunks straight to
//! the muxer when the target container carries the source codec, and
//! decodes, clips, and re-encodes otherwise.

use std::sync::Arc;

use snip_codecs::{
    AudioDecoderConfig, AudioEncoderConfig, CodecProvider, VideoDecoderConfig, VideoEncoderConfig,
};
use snip_containers::mp4::{ChunkStream, Mp4Demuxer};
use snip_containers::webm::WebmMuxer;
use snip_containers::{
    probe, AudioTrackMetadata, CodecId, ContainerFormat, Rotation, TrackMetadata,
    VideoTrackMetadata,
};
use snip_core::{
    AbortSignal, AudioData, CodecError, ContainerError, EncodedChunk, Error, Result, TimeRange,
    VideoFrame, MICROS_PER_SEC,
};
use snip_pipeline::{
    select_extractor, AudioEncodeStage, CodecTransform, FrameExtractor, MuxerAdapter,
    ProgressSink, PushOutcome, VideoEncodeStage,
};
use tracing::{debug, info};

use crate::options::TrimOptions;
use crate::source::Source;

/// The finished container.
pub struct TrimOutput {
    pub data: Vec<u8>,
    pub mime: &'static str,
}

/// How the operation ended.
pub enum TrimOutcome {
    Finished(TrimOutput),
    /// The caller aborted; not an error.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Initializing,
    Encoding,
    Finalizing,
    Done,
    Aborted,
}

fn transition(state: &mut State, next: State) {
    debug!(from = ?*state, to = ?next, "trim state");
    *state = next;
}

/// Codec for re-encoded video when the caller gives no override.
const DEFAULT_VIDEO_CODEC: CodecId = CodecId::Vp9;
/// Codec for re-encoded audio.
const DEFAULT_AUDIO_CODEC: CodecId = CodecId::Opus;

/// Rounds with no pipeline movement before the operation is declared stuck.
///
/// Every stage is polled each round and nothing external can unblock a
/// stalled processor between rounds, so a handful of retries is enough.
const STALL_LIMIT: u32 = 8;

/// Trim `[options.start, options.end)` out of `source`.
///
/// Resolves as [`TrimOutcome::Stopped`] when the abort signal fires; all
/// fatal errors reject without a further progress callback.
pub fn trim(
    source: Source,
    provider: &dyn CodecProvider,
    mut options: TrimOptions,
) -> Result<TrimOutcome> {
    let progress = ProgressSink::new(options.on_progress.take());
    let signal = options.signal.clone();

    match run(source, provider, &options, &progress, &signal) {
        Ok(TrimOutcome::Finished(output)) => {
            progress.complete();
            Ok(TrimOutcome::Finished(output))
        }
        Ok(TrimOutcome::Stopped) | Err(Error::Cancelled) => {
            progress.fail();
            Ok(TrimOutcome::Stopped)
        }
        Err(err) => {
            progress.fail();
            Err(err)
        }
    }
}

fn run(
    source: Source,
    provider: &dyn CodecProvider,
    options: &TrimOptions,
    progress: &ProgressSink,
    signal: &AbortSignal,
) -> Result<TrimOutcome> {
    let mut state = State::Idle;
    transition(&mut state, State::Initializing);
    signal.check()?;

    if !options.start.is_finite() || !options.end.is_finite() {
        return Err(Error::InvalidParameter("non-finite trim bounds".into()));
    }
    if options.start < 0.0 || options.end <= options.start {
        return Err(Error::InvalidParameter(format!(
            "invalid trim window {}..{}",
            options.start, options.end
        )));
    }

    let data: Arc<[u8]> = source
        .fetch(options.credentials, options.authorization.as_deref())?
        .into();
    signal.check()?;

    let format = probe(&data)?;
    if format != ContainerFormat::Mp4 {
        return Err(ContainerError::Other(format!(
            "cannot demux {} input",
            format.mime_type()
        ))
        .into());
    }

    let demuxer = Mp4Demuxer::open(Arc::clone(&data))?;
    if demuxer.track_count() == 0 {
        return Err(Error::NoMediaTracks);
    }
    let duration_us = demuxer.duration_us();

    let mut window = TimeRange::from_seconds(options.start, options.end);
    if duration_us > 0 && window.end_us > duration_us {
        window.end_us = duration_us;
    }
    if window.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "trim window starts at or past the {:.3}s source end",
            duration_us as f64 / MICROS_PER_SEC as f64
        )));
    }

    // Full range, audio kept, nothing re-encoded: hand the source back.
    let full_range = window.start_us == 0 && window.end_us >= duration_us;
    if full_range && !options.mute && options.video.is_none() {
        info!("full-range trim with no overrides, returning source unchanged");
        transition(&mut state, State::Done);
        return Ok(TrimOutcome::Finished(TrimOutput {
            data: data.to_vec(),
            mime: format.mime_type(),
        }));
    }

    let video_track = demuxer.tracks().enumerate().find_map(|(i, t)| match t {
        TrackMetadata::Video(meta) => Some((i, meta.clone())),
        _ => None,
    });
    let audio_track = if options.mute {
        None
    } else {
        demuxer.tracks().enumerate().find_map(|(i, t)| match t {
            TrackMetadata::Audio(meta) => Some((i, meta.clone())),
            _ => None,
        })
    };
    if video_track.is_none() && audio_track.is_none() {
        return Err(Error::NoMediaTracks);
    }

    // Verify every encode profile before a single frame is processed.
    let video_config = video_track.as_ref().map(|(_, meta)| {
        options
            .video
            .clone()
            .unwrap_or_else(|| VideoEncoderConfig::from_track(DEFAULT_VIDEO_CODEC, meta))
    });
    if let Some(config) = &video_config {
        check_video_support(provider, config)?;
    }
    let audio_plan = match &audio_track {
        Some((_, meta)) => Some(plan_audio(provider, meta)?),
        None => None,
    };

    // Assemble the output container and one pipeline per track.
    let mut mux = MuxerAdapter::new(Box::new(WebmMuxer::new()));
    let window_len = window.duration_us();

    let mut video_pipeline = match (&video_track, &video_config) {
        (Some((index, meta)), Some(config)) => {
            let out_track = mux.add_video_track(&VideoTrackMetadata {
                codec: config.codec,
                codec_config: None,
                width: config.width,
                height: config.height,
                rotation: Rotation::R0,
                duration_us: window_len,
                frame_rate: config.frame_rate,
            })?;
            let stream = demuxer.chunk_stream(*index, window)?;
            let extractor = select_extractor(
                provider,
                &VideoDecoderConfig::from(meta),
                stream,
                window,
                meta.rotation,
                signal.clone(),
            )?;
            let encoder = provider.video_encoder(config)?;
            Some(VideoPipeline {
                extractor,
                encode: VideoEncodeStage::new(encoder),
                out_track,
                progress_slot: progress.register_track(),
                pending: None,
                done: false,
            })
        }
        _ => None,
    };

    let mut audio_pipeline = match (&audio_track, audio_plan) {
        (Some((index, meta)), Some(plan)) => {
            let stream = demuxer.chunk_stream(*index, window)?;
            Some(build_audio_pipeline(
                &mut mux, provider, meta, plan, stream, window, progress,
            )?)
        }
        _ => None,
    };

    transition(&mut state, State::Encoding);
    let mut stalled_rounds = 0u32;
    loop {
        if signal.is_aborted() {
            transition(&mut state, State::Aborted);
            return Ok(TrimOutcome::Stopped);
        }

        let mut moved = false;
        let mut all_done = true;
        if let Some(pipeline) = &mut video_pipeline {
            moved |= pipeline.step(&mut mux, progress, window_len, signal)?;
            all_done &= pipeline.done;
        }
        if let Some(pipeline) = &mut audio_pipeline {
            moved |= pipeline.step(&mut mux, progress, window_len, signal)?;
            all_done &= pipeline.done;
        }

        if all_done {
            break;
        }
        stalled_rounds = if moved { 0 } else { stalled_rounds + 1 };
        if stalled_rounds > STALL_LIMIT {
            return Err(CodecError::Other("pipeline made no progress".into()).into());
        }
    }

    transition(&mut state, State::Finalizing);
    let (out, mime) = mux.finalize()?;
    transition(&mut state, State::Done);
    info!(bytes = out.len(), mime, "trim finished");
    Ok(TrimOutcome::Finished(TrimOutput { data: out, mime }))
}

fn check_video_support(provider: &dyn CodecProvider, config: &VideoEncoderConfig) -> Result<()> {
    if config.codec.webm_codec_id().is_none() {
        return Err(Error::UnsupportedCodec(format!(
            "{:?} cannot be muxed into the output container",
            config.codec
        )));
    }
    if !provider.supports_video_encode(config) {
        return Err(Error::UnsupportedCodec(format!(
            "no {:?} encoder available",
            config.codec
        )));
    }
    if !provider.capabilities().encode_size_ok(config) {
        return Err(Error::UnsupportedCodec(format!(
            "{}x{} exceeds the platform encode size cap",
            config.width, config.height
        )));
    }
    Ok(())
}

enum AudioPlan {
    /// The target container carries the source codec; chunks copy through.
    Copy,
    Reencode(AudioEncoderConfig),
}

fn plan_audio(provider: &dyn CodecProvider, meta: &AudioTrackMetadata) -> Result<AudioPlan> {
    if meta.codec.webm_codec_id().is_some() {
        return Ok(AudioPlan::Copy);
    }

    let encode = AudioEncoderConfig::from_track(DEFAULT_AUDIO_CODEC, meta);
    let decode = AudioDecoderConfig::from(meta);
    if !provider.supports_audio_decode(&decode) {
        return Err(Error::UnsupportedCodec(format!(
            "no {:?} audio decoder available",
            meta.codec
        )));
    }
    if !provider.supports_audio_encode(&encode) {
        return Err(Error::UnsupportedCodec(format!(
            "no {:?} audio encoder available",
            encode.codec
        )));
    }
    Ok(AudioPlan::Reencode(encode))
}

fn build_audio_pipeline(
    mux: &mut MuxerAdapter,
    provider: &dyn CodecProvider,
    meta: &AudioTrackMetadata,
    plan: AudioPlan,
    stream: ChunkStream,
    window: TimeRange,
    progress: &ProgressSink,
) -> Result<AudioPipeline> {
    match plan {
        AudioPlan::Copy => {
            let out_track = mux.add_audio_track(&AudioTrackMetadata {
                codec: meta.codec,
                codec_config: meta.codec_config.clone(),
                sample_rate: meta.sample_rate,
                channels: meta.channels,
                duration_us: window.duration_us(),
            })?;
            Ok(AudioPipeline {
                mode: AudioMode::Copy { stream },
                out_track,
                progress_slot: progress.register_track(),
                done: false,
            })
        }
        AudioPlan::Reencode(encode_config) => {
            let out_track = mux.add_audio_track(&AudioTrackMetadata {
                codec: encode_config.codec,
                codec_config: None,
                sample_rate: encode_config.sample_rate,
                channels: encode_config.channels,
                duration_us: window.duration_us(),
            })?;
            let decoder = provider.audio_decoder(&AudioDecoderConfig::from(meta))?;
            let encoder = provider.audio_encoder(&encode_config)?;
            Ok(AudioPipeline {
                mode: AudioMode::Reencode {
                    stream,
                    decode: CodecTransform::new(decoder),
                    encode: AudioEncodeStage::new(encoder),
                    window,
                    pending: None,
                    pending_chunk: None,
                    source_done: false,
                },
                out_track,
                progress_slot: progress.register_track(),
                done: false,
            })
        }
    }
}

struct VideoPipeline {
    extractor: Box<dyn FrameExtractor>,
    encode: VideoEncodeStage,
    out_track: usize,
    progress_slot: usize,
    /// Frame held back while the encoder queue is full.
    pending: Option<VideoFrame>,
    done: bool,
}

impl VideoPipeline {
    /// One cooperative step. Returns whether anything moved.
    fn step(
        &mut self,
        mux: &mut MuxerAdapter,
        progress: &ProgressSink,
        window_len: i64,
        signal: &AbortSignal,
    ) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        signal.check()?;
        let mut moved = false;

        while let Some(chunk) = self.encode.next_chunk() {
            let ts = mux.write_chunk(self.out_track, chunk)?;
            progress.report(self.progress_slot, ts as f64 / window_len as f64);
            moved = true;
        }

        if let Some(frame) = self.pending.take() {
            match self.encode.push_frame(&frame)? {
                PushOutcome::Accepted => moved = true,
                PushOutcome::Full => {
                    self.pending = Some(frame);
                    return Ok(moved);
                }
            }
        }

        if !self.extractor.is_finished() {
            if let Some(frame) = self.extractor.next_frame()? {
                moved = true;
                if self.encode.push_frame(&frame)? == PushOutcome::Full {
                    self.pending = Some(frame);
                }
            }
        }

        if self.extractor.is_finished() && self.pending.is_none() {
            self.encode.finish(signal)?;
            while let Some(chunk) = self.encode.next_chunk() {
                let ts = mux.write_chunk(self.out_track, chunk)?;
                progress.report(self.progress_slot, ts as f64 / window_len as f64);
                moved = true;
            }
            if self.encode.is_drained() {
                self.done = true;
                progress.report(self.progress_slot, 1.0);
                moved = true;
            }
        }
        Ok(moved)
    }
}

enum AudioMode {
    Copy {
        stream: ChunkStream,
    },
    Reencode {
        stream: ChunkStream,
        decode: CodecTransform<Box<dyn snip_codecs::AudioDecoder>>,
        encode: AudioEncodeStage,
        window: TimeRange,
        /// Clipped audio held back while the encoder queue is full.
        pending: Option<AudioData>,
        /// Coded chunk held back while the decoder queue is full.
        pending_chunk: Option<EncodedChunk>,
        source_done: bool,
    },
}

struct AudioPipeline {
    mode: AudioMode,
    out_track: usize,
    progress_slot: usize,
    done: bool,
}

impl AudioPipeline {
    fn step(
        &mut self,
        mux: &mut MuxerAdapter,
        progress: &ProgressSink,
        window_len: i64,
        signal: &AbortSignal,
    ) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        signal.check()?;

        match &mut self.mode {
            AudioMode::Copy { stream } => match stream.next_chunk()? {
                Some(chunk) => {
                    let ts = mux.write_chunk(self.out_track, chunk)?;
                    progress.report(self.progress_slot, ts as f64 / window_len as f64);
                    Ok(true)
                }
                None => {
                    self.done = true;
                    progress.report(self.progress_slot, 1.0);
                    Ok(true)
                }
            },
            AudioMode::Reencode {
                stream,
                decode,
                encode,
                window,
                pending,
                pending_chunk,
                source_done,
            } => {
                let mut moved = false;

                while let Some(chunk) = encode.next_chunk() {
                    let ts = mux.write_chunk(self.out_track, chunk)?;
                    progress.report(self.progress_slot, ts as f64 / window_len as f64);
                    moved = true;
                }

                if let Some(audio) = pending.take() {
                    match encode.push_audio(&audio)? {
                        PushOutcome::Accepted => moved = true,
                        PushOutcome::Full => {
                            *pending = Some(audio);
                            return Ok(moved);
                        }
                    }
                }

                if let Some(mut audio) = decode.next_ready() {
                    moved = true;
                    if audio.clip_front(window.start_us) && audio.clip_back(window.end_us) {
                        if encode.push_audio(&audio)? == PushOutcome::Full {
                            *pending = Some(audio);
                        }
                    }
                    return Ok(moved);
                }

                if let Some(chunk) = pending_chunk.take() {
                    match decode.push(&chunk)? {
                        PushOutcome::Accepted => moved = true,
                        PushOutcome::Full => *pending_chunk = Some(chunk),
                    }
                    return Ok(moved);
                }

                if !*source_done {
                    match stream.next_chunk()? {
                        Some(chunk) => match decode.push(&chunk)? {
                            PushOutcome::Accepted => moved = true,
                            PushOutcome::Full => {
                                *pending_chunk = Some(chunk);
                                moved = true;
                            }
                        },
                        None => {
                            *source_done = true;
                            decode.finish(signal)?;
                            moved = true;
                        }
                    }
                    return Ok(moved);
                }

                // Source and decoder drained; flush the encoder and finish.
                encode.finish(signal)?;
                while let Some(chunk) = encode.next_chunk() {
                    let ts = mux.write_chunk(self.out_track, chunk)?;
                    progress.report(self.progress_slot, ts as f64 / window_len as f64);
                    moved = true;
                }
                if encode.is_drained() {
                    self.done = true;
                    progress.report(self.progress_slot, 1.0);
                    moved = true;
                }
                Ok(moved)
            }
        }
    }
}
