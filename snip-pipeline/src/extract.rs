//! Frame extraction for a trim window.
//!
//! Two variants behind one trait: `DecodeExtractor` feeds demuxed chunks
//! through a video-decode [`CodecTransform`]; `CaptureExtractor` samples a
//! provider-supplied realtime frame tap when bitstream decode is
//! unavailable or the platform decoder is listed broken. Selection tries
//! the decoder first and falls back silently.

use snip_codecs::{CodecProvider, FrameTap, VideoDecoderConfig};
use snip_containers::mp4::ChunkStream;
use snip_containers::Rotation;
use snip_core::{AbortSignal, EncodedChunk, Error, Result, TimeRange, VideoFrame};
use tracing::{debug, trace};

use crate::rotate::RotationScratch;
use crate::stage::{CodecTransform, PushOutcome};

/// A source of raw, window-clipped, rotation-corrected video frames.
///
/// `next_frame` returning `Ok(None)` means no frame is available right now;
/// the extractor is only exhausted once `is_finished` reports true.
pub trait FrameExtractor {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    fn is_finished(&self) -> bool;

    /// Release the underlying decode/capture resources. Idempotent.
    fn stop(&mut self);
}

/// Decoder-based extraction from a coded chunk stream.
pub struct DecodeExtractor {
    stream: ChunkStream,
    transform: CodecTransform<Box<dyn snip_codecs::VideoDecoder>>,
    window: TimeRange,
    rotation: Rotation,
    scratch: RotationScratch,
    signal: AbortSignal,
    /// Chunk held back while the decoder queue is full.
    pending: Option<EncodedChunk>,
    source_done: bool,
    finished: bool,
}

impl DecodeExtractor {
    pub fn new(
        stream: ChunkStream,
        decoder: Box<dyn snip_codecs::VideoDecoder>,
        window: TimeRange,
        rotation: Rotation,
        signal: AbortSignal,
    ) -> Self {
        Self {
            stream,
            transform: CodecTransform::new(decoder),
            window,
            rotation,
            scratch: RotationScratch::new(),
            signal,
            pending: None,
            source_done: false,
            finished: false,
        }
    }

    /// Clip a decoded frame against the window.
    ///
    /// Frames ending before the window start are dropped immediately;
    /// a frame at or past the window end force-terminates extraction so
    /// nothing is decoded that can never be used.
    fn accept(&mut self, mut frame: VideoFrame) -> Result<Option<VideoFrame>> {
        if frame.end_us() <= self.window.start_us {
            trace!(ts = frame.timestamp_us, "dropping pre-window frame");
            return Ok(None);
        }
        if frame.timestamp_us >= self.window.end_us {
            self.force_stop();
            return Ok(None);
        }
        if frame.end_us() >= self.window.end_us {
            // Last usable frame; stop pulling more chunks.
            self.force_stop();
        }
        self.scratch.apply(&mut frame, self.rotation)?;
        Ok(Some(frame))
    }

    fn force_stop(&mut self) {
        self.stream.stop();
        self.source_done = true;
        self.finished = true;
    }
}

impl FrameExtractor for DecodeExtractor {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        loop {
            self.signal.check()?;

            if self.finished {
                // Anything still buffered lies past the window.
                while self.transform.next_ready().is_some() {}
                return Ok(None);
            }

            if let Some(frame) = self.transform.next_ready() {
                if let Some(frame) = self.accept(frame)? {
                    return Ok(Some(frame));
                }
                continue;
            }

            if let Some(chunk) = self.pending.take() {
                match self.transform.push(&chunk)? {
                    PushOutcome::Accepted => continue,
                    PushOutcome::Full => {
                        self.pending = Some(chunk);
                        return Ok(None);
                    }
                }
            }

            if self.source_done {
                self.transform.finish(&self.signal)?;
                if self.transform.ready_len() == 0 {
                    self.finished = true;
                }
                continue;
            }

            match self.stream.next_chunk()? {
                Some(chunk) => match self.transform.push(&chunk)? {
                    PushOutcome::Accepted => {}
                    PushOutcome::Full => {
                        self.pending = Some(chunk);
                        return Ok(None);
                    }
                },
                None => self.source_done = true,
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn stop(&mut self) {
        self.force_stop();
    }
}

/// Capture-based extraction from a realtime frame tap.
pub struct CaptureExtractor {
    tap: Box<dyn FrameTap>,
    window: TimeRange,
    rotation: Rotation,
    scratch: RotationScratch,
    signal: AbortSignal,
    finished: bool,
}

impl CaptureExtractor {
    pub fn new(
        tap: Box<dyn FrameTap>,
        window: TimeRange,
        rotation: Rotation,
        signal: AbortSignal,
    ) -> Self {
        Self {
            tap,
            window,
            rotation,
            scratch: RotationScratch::new(),
            signal,
            finished: false,
        }
    }
}

impl FrameExtractor for CaptureExtractor {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        loop {
            self.signal.check()?;
            if self.finished {
                return Ok(None);
            }

            let Some(mut frame) = self.tap.next_frame()? else {
                self.stop();
                return Ok(None);
            };
            if frame.end_us() <= self.window.start_us {
                continue;
            }
            if frame.timestamp_us >= self.window.end_us {
                self.stop();
                return Ok(None);
            }
            self.scratch.apply(&mut frame, self.rotation)?;
            return Ok(Some(frame));
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn stop(&mut self) {
        if !self.finished {
            self.tap.stop();
            self.finished = true;
        }
    }
}

/// Pick an extractor for the track.
///
/// The decoder path is tried first; decode-capability failures fall back
/// silently to the capture tap. Any other construction error surfaces.
pub fn select_extractor(
    provider: &dyn CodecProvider,
    config: &VideoDecoderConfig,
    stream: ChunkStream,
    window: TimeRange,
    rotation: Rotation,
    signal: AbortSignal,
) -> Result<Box<dyn FrameExtractor>> {
    let decoder_listed_broken = !provider.capabilities().decoder_usable(config.codec);

    if !decoder_listed_broken && provider.supports_video_decode(config) {
        match provider.video_decoder(config) {
            Ok(decoder) => {
                return Ok(Box::new(DecodeExtractor::new(
                    stream, decoder, window, rotation, signal,
                )));
            }
            Err(Error::DecodeUnavailable(reason)) => {
                debug!(%reason, "decoder construction failed, using capture fallback");
            }
            Err(err) => return Err(err),
        }
    } else {
        debug!(codec = ?config.codec, "bitstream decode unavailable, using capture fallback");
    }

    let tap = provider.frame_tap(config)?;
    Ok(Box::new(CaptureExtractor::new(tap, window, rotation, signal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::{EncodedChunk, PixelFormat, VideoFrame};

    /// Emits one gray frame per chunk, at the chunk's timestamp.
    struct PassthroughDecoder;

    impl snip_codecs::VideoDecoder for PassthroughDecoder {
        fn decode(&mut self, chunk: &EncodedChunk) -> Result<Vec<VideoFrame>> {
            let mut frame = VideoFrame::new(2, 2, PixelFormat::Gray8);
            frame.timestamp_us = chunk.timestamp_us;
            frame.duration_us = Some(chunk.duration_us);
            Ok(vec![frame])
        }

        fn flush(&mut self) -> Result<Vec<VideoFrame>> {
            Ok(Vec::new())
        }
    }

    struct TestTap {
        frames: Vec<VideoFrame>,
        stopped: bool,
    }

    impl FrameTap for TestTap {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
            if self.frames.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.frames.remove(0)))
            }
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    fn frame_at(ts: i64) -> VideoFrame {
        let mut frame = VideoFrame::new(2, 2, PixelFormat::Gray8);
        frame.timestamp_us = ts;
        frame.duration_us = Some(1000);
        frame
    }

    #[test]
    fn test_capture_extractor_clips_window() {
        let tap = TestTap {
            frames: (0..10).map(|i| frame_at(i * 1000)).collect(),
            stopped: false,
        };
        let mut extractor = CaptureExtractor::new(
            Box::new(tap),
            TimeRange::new(2000, 5000),
            Rotation::R0,
            AbortSignal::never(),
        );

        let mut timestamps = Vec::new();
        while let Some(frame) = extractor.next_frame().unwrap() {
            timestamps.push(frame.timestamp_us);
        }
        assert_eq!(timestamps, vec![2000, 3000, 4000]);
        assert!(extractor.is_finished());
    }

    fn stream_for(window: TimeRange) -> ChunkStream {
        use snip_containers::mp4::{Mp4Demuxer, Mp4Muxer};
        use snip_containers::{CodecId, Muxer, VideoTrackMetadata};

        let mut muxer = Box::new(Mp4Muxer::new());
        let track = muxer
            .add_video_track(&VideoTrackMetadata {
                codec: CodecId::H264,
                codec_config: None,
                width: 2,
                height: 2,
                rotation: Rotation::R0,
                duration_us: 0,
                frame_rate: Some(10.0),
            })
            .unwrap();
        for i in 0..20i64 {
            muxer
                .write_chunk(track, &EncodedChunk::key(i * 100_000, 100_000, vec![0; 8]))
                .unwrap();
        }
        let bytes = muxer.finalize().unwrap();
        Mp4Demuxer::open(bytes).unwrap().chunk_stream(0, window).unwrap()
    }

    #[test]
    fn test_decode_extractor_stops_at_window_end() {
        let window = TimeRange::new(0, 500_000);
        let mut extractor = DecodeExtractor::new(
            stream_for(window),
            Box::new(PassthroughDecoder),
            window,
            Rotation::R0,
            AbortSignal::never(),
        );

        let mut count = 0;
        while let Some(frame) = extractor.next_frame().unwrap() {
            assert!(frame.timestamp_us < 500_000 + 100);
            count += 1;
        }
        assert!(extractor.is_finished());
        // 5 frames of 100ms cover [0, 500ms).
        assert_eq!(count, 5);
    }

    #[test]
    fn test_capture_extractor_abort() {
        let tap = TestTap {
            frames: vec![frame_at(0)],
            stopped: false,
        };
        let controller = snip_core::AbortController::new();
        let mut extractor = CaptureExtractor::new(
            Box::new(tap),
            TimeRange::new(0, 10_000),
            Rotation::R0,
            controller.signal(),
        );
        controller.abort();
        assert!(matches!(extractor.next_frame(), Err(Error::Cancelled)));
    }
}
