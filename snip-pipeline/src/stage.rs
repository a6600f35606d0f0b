//! The generic backpressure stage.
//!
//! `CodecTransform` wraps one coded-media processor (decoder or encoder) as
//! a single-input/single-output transform. Input is accepted only while the
//! processor's internal queue is below [`HIGH_WATERMARK`]; beyond that the
//! push reports [`PushOutcome::Full`] and the producer retries on a later
//! step. This bounds memory use regardless of producer speed.

use std::collections::VecDeque;

use snip_core::{AbortSignal, Error, Result};
use tracing::debug;

/// Maximum processor queue depth before input is held back.
pub const HIGH_WATERMARK: usize = 5;

/// Result of offering one item to a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item was consumed.
    Accepted,
    /// The processor queue is at capacity; retry after draining output.
    Full,
}

/// One coded-media processor as seen by the backpressure stage.
///
/// Decoders and encoders both fit this shape; `process` may emit zero or
/// more outputs per input, with the remainder arriving on later calls or
/// at `flush`.
pub trait CodedProcessor {
    type Input;
    type Output;

    fn process(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>>;
    fn flush(&mut self) -> Result<Vec<Self::Output>>;
    fn queue_depth(&self) -> usize;
}

impl CodedProcessor for Box<dyn snip_codecs::VideoDecoder> {
    type Input = snip_core::EncodedChunk;
    type Output = snip_core::VideoFrame;

    fn process(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>> {
        self.decode(input)
    }

    fn flush(&mut self) -> Result<Vec<Self::Output>> {
        self.as_mut().flush()
    }

    fn queue_depth(&self) -> usize {
        self.as_ref().queue_depth()
    }
}

impl CodedProcessor for Box<dyn snip_codecs::VideoEncoder> {
    type Input = snip_core::VideoFrame;
    type Output = snip_core::EncodedChunk;

    fn process(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>> {
        self.encode(input)
    }

    fn flush(&mut self) -> Result<Vec<Self::Output>> {
        self.as_mut().flush()
    }

    fn queue_depth(&self) -> usize {
        self.as_ref().queue_depth()
    }
}

impl CodedProcessor for Box<dyn snip_codecs::AudioDecoder> {
    type Input = snip_core::EncodedChunk;
    type Output = snip_core::AudioData;

    fn process(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>> {
        self.decode(input)
    }

    fn flush(&mut self) -> Result<Vec<Self::Output>> {
        self.as_mut().flush()
    }

    fn queue_depth(&self) -> usize {
        self.as_ref().queue_depth()
    }
}

impl CodedProcessor for Box<dyn snip_codecs::AudioEncoder> {
    type Input = snip_core::AudioData;
    type Output = snip_core::EncodedChunk;

    fn process(&mut self, input: &Self::Input) -> Result<Vec<Self::Output>> {
        self.encode(input)
    }

    fn flush(&mut self) -> Result<Vec<Self::Output>> {
        self.as_mut().flush()
    }

    fn queue_depth(&self) -> usize {
        self.as_ref().queue_depth()
    }
}

/// Backpressure-aware transform around one processor.
///
/// The processor is owned exclusively by the transform and released by
/// `finish`; one live processor per track per direction.
pub struct CodecTransform<P: CodedProcessor> {
    processor: Option<P>,
    ready: VecDeque<P::Output>,
    finished: bool,
}

impl<P: CodedProcessor> CodecTransform<P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor: Some(processor),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Offer one item. Holds the item back with [`PushOutcome::Full`] while
    /// the processor queue is at the high watermark.
    pub fn push(&mut self, item: &P::Input) -> Result<PushOutcome> {
        let processor = self
            .processor
            .as_mut()
            .ok_or_else(|| Error::InvalidParameter("push after finish".into()))?;

        if processor.queue_depth() >= HIGH_WATERMARK {
            return Ok(PushOutcome::Full);
        }

        self.ready.extend(processor.process(item)?);
        Ok(PushOutcome::Accepted)
    }

    /// Take the next produced output, if any.
    pub fn next_ready(&mut self) -> Option<P::Output> {
        self.ready.pop_front()
    }

    /// Number of outputs produced but not yet taken.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Borrow the live processor, if `finish` has not released it yet.
    pub fn processor(&self) -> Option<&P> {
        self.processor.as_ref()
    }

    /// Flush the processor and release it. Idempotent.
    ///
    /// An abort-triggered flush failure is swallowed (the output is being
    /// discarded anyway); any other flush failure surfaces.
    pub fn finish(&mut self, signal: &AbortSignal) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if let Some(mut processor) = self.processor.take() {
            match processor.flush() {
                Ok(outputs) => self.ready.extend(outputs),
                Err(err) if signal.is_aborted() => {
                    debug!("ignoring flush failure during abort: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::AbortController;

    /// Doubles each input; holds one output back until flush, and reports
    /// a configurable queue depth.
    struct TestProcessor {
        depth: usize,
        held: Option<i64>,
        fail_flush: bool,
    }

    impl CodedProcessor for TestProcessor {
        type Input = i64;
        type Output = i64;

        fn process(&mut self, input: &i64) -> Result<Vec<i64>> {
            let out = self.held.replace(*input * 2);
            Ok(out.into_iter().collect())
        }

        fn flush(&mut self) -> Result<Vec<i64>> {
            if self.fail_flush {
                return Err(Error::InvalidParameter("flush failed".into()));
            }
            Ok(self.held.take().into_iter().collect())
        }

        fn queue_depth(&self) -> usize {
            self.depth
        }
    }

    fn processor() -> TestProcessor {
        TestProcessor {
            depth: 0,
            held: None,
            fail_flush: false,
        }
    }

    #[test]
    fn test_push_and_drain() {
        let mut stage = CodecTransform::new(processor());
        assert_eq!(stage.push(&1).unwrap(), PushOutcome::Accepted);
        assert_eq!(stage.next_ready(), None);
        assert_eq!(stage.push(&2).unwrap(), PushOutcome::Accepted);
        assert_eq!(stage.next_ready(), Some(2));
        stage.finish(&AbortSignal::never()).unwrap();
        assert_eq!(stage.next_ready(), Some(4));
        assert_eq!(stage.next_ready(), None);
    }

    #[test]
    fn test_full_at_high_watermark() {
        let mut stage = CodecTransform::new(TestProcessor {
            depth: HIGH_WATERMARK,
            held: None,
            fail_flush: false,
        });
        assert_eq!(stage.push(&1).unwrap(), PushOutcome::Full);
    }

    #[test]
    fn test_finish_idempotent_and_push_after_finish_errors() {
        let mut stage = CodecTransform::new(processor());
        stage.finish(&AbortSignal::never()).unwrap();
        stage.finish(&AbortSignal::never()).unwrap();
        assert!(stage.push(&1).is_err());
    }

    #[test]
    fn test_flush_failure_swallowed_only_when_aborted() {
        let mut stage = CodecTransform::new(TestProcessor {
            depth: 0,
            held: None,
            fail_flush: true,
        });
        assert!(stage.finish(&AbortSignal::never()).is_err());

        let controller = AbortController::new();
        controller.abort();
        let mut stage = CodecTransform::new(TestProcessor {
            depth: 0,
            held: None,
            fail_flush: true,
        });
        stage.finish(&controller.signal()).unwrap();
    }
}
