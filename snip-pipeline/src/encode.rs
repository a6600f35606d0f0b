//! Encode stages.
//!
//! Both stages are [`CodecTransform`] specializations. The video stage
//! additionally routes encoder output through a [`GapAwareReorder`] so the
//! muxer sees monotonically non-decreasing timestamps even when the encoder
//! emits out of order; the audio stage forwards in arrival order.

use std::collections::VecDeque;

use snip_codecs::{AudioEncoder, VideoEncoder};
use snip_core::{AbortSignal, AudioData, EncodedChunk, Result, VideoFrame};

use crate::reorder::GapAwareReorder;
use crate::stage::{CodecTransform, PushOutcome};

/// Video encode stage with output reordering.
pub struct VideoEncodeStage {
    transform: CodecTransform<Box<dyn VideoEncoder>>,
    reorder: GapAwareReorder,
    ready: VecDeque<EncodedChunk>,
    finished: bool,
}

impl VideoEncodeStage {
    pub fn new(encoder: Box<dyn VideoEncoder>) -> Self {
        Self {
            transform: CodecTransform::new(encoder),
            reorder: GapAwareReorder::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Offer one frame; [`PushOutcome::Full`] suspends the producer.
    pub fn push_frame(&mut self, frame: &VideoFrame) -> Result<PushOutcome> {
        let outcome = self.transform.push(frame)?;
        self.collect();
        Ok(outcome)
    }

    /// Next chunk cleared for muxing, in non-decreasing timestamp order.
    pub fn next_chunk(&mut self) -> Option<EncodedChunk> {
        self.ready.pop_front()
    }

    /// Flush the encoder and release everything still reordering.
    pub fn finish(&mut self, signal: &AbortSignal) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.transform.finish(signal)?;
        self.collect();
        self.ready.extend(self.reorder.flush());
        self.finished = true;
        Ok(())
    }

    pub fn is_drained(&self) -> bool {
        self.finished && self.ready.is_empty()
    }

    /// Config bytes the encoder produced, while it is still alive.
    pub fn codec_config(&self) -> Option<Vec<u8>> {
        self.transform.processor().and_then(|e| e.codec_config())
    }

    fn collect(&mut self) {
        while let Some(chunk) = self.transform.next_ready() {
            self.reorder.push(chunk);
        }
        self.ready.extend(self.reorder.drain_ready());
    }
}

/// Audio encode stage; encoder output is already in order.
pub struct AudioEncodeStage {
    transform: CodecTransform<Box<dyn AudioEncoder>>,
    finished: bool,
}

impl AudioEncodeStage {
    pub fn new(encoder: Box<dyn AudioEncoder>) -> Self {
        Self {
            transform: CodecTransform::new(encoder),
            finished: false,
        }
    }

    pub fn push_audio(&mut self, audio: &AudioData) -> Result<PushOutcome> {
        self.transform.push(audio)
    }

    pub fn next_chunk(&mut self) -> Option<EncodedChunk> {
        self.transform.next_ready()
    }

    pub fn finish(&mut self, signal: &AbortSignal) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.transform.finish(signal)?;
        self.finished = true;
        Ok(())
    }

    pub fn is_drained(&self) -> bool {
        self.finished && self.transform.ready_len() == 0
    }
}
