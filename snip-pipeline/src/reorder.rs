//! Gap-aware reorder buffer for encoder output.
//!
//! Encoders may emit compressed chunks out of timestamp order (frame
//! reordering for inter prediction). Chunks are insertion-sorted by
//! timestamp; only the prefix with no timeline gap is released, so a chunk
//! is never forwarded while a later-arriving chunk could still precede it.

use std::collections::VecDeque;

use snip_core::EncodedChunk;
use tracing::warn;

/// Tolerance when testing whether one chunk's span touches the next.
pub const EPSILON_US: i64 = 100;

/// Hard cap on buffered chunks; a gap older than this is treated as real.
const MAX_PENDING: usize = 16;

/// Insertion-sorted chunk buffer that releases gap-free prefixes.
#[derive(Default)]
pub struct GapAwareReorder {
    pending: VecDeque<EncodedChunk>,
}

impl GapAwareReorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk in timestamp order.
    pub fn push(&mut self, chunk: EncodedChunk) {
        let pos = self
            .pending
            .iter()
            .position(|c| c.timestamp_us > chunk.timestamp_us)
            .unwrap_or(self.pending.len());
        self.pending.insert(pos, chunk);
    }

    /// Release the longest prefix where every chunk's span reaches its
    /// successor's timestamp. The final buffered chunk has no successor to
    /// validate against, so it stays until `flush` or until one arrives.
    pub fn drain_ready(&mut self) -> Vec<EncodedChunk> {
        let mut released = Vec::new();
        loop {
            match (self.pending.front(), self.pending.get(1)) {
                (Some(head), Some(next)) if head.end_us() + EPSILON_US >= next.timestamp_us => {}
                (Some(_), _) if self.pending.len() > MAX_PENDING => {
                    warn!("reorder buffer over capacity, releasing across a timeline gap");
                }
                _ => break,
            }
            if let Some(head) = self.pending.pop_front() {
                released.push(head);
            }
        }
        released
    }

    /// Release everything, in timestamp order.
    pub fn flush(&mut self) -> Vec<EncodedChunk> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(ts: i64) -> EncodedChunk {
        EncodedChunk::key(ts, 1000, vec![0])
    }

    #[test]
    fn test_out_of_order_arrival_sorted() {
        let mut buffer = GapAwareReorder::new();
        buffer.push(chunk(2000));
        buffer.push(chunk(0));
        buffer.push(chunk(1000));

        let released = buffer.drain_ready();
        let timestamps: Vec<i64> = released.iter().map(|c| c.timestamp_us).collect();
        assert_eq!(timestamps, vec![0, 1000]);
        // 2000 has no successor yet.
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.flush()[0].timestamp_us, 2000);
    }

    #[test]
    fn test_gap_holds_release() {
        let mut buffer = GapAwareReorder::new();
        buffer.push(chunk(0));
        buffer.push(chunk(5000));
        // 0..1000 does not reach 5000, so nothing is releasable.
        assert!(buffer.drain_ready().is_empty());

        // Late arrivals fill the gap.
        buffer.push(chunk(1000));
        buffer.push(chunk(2000));
        buffer.push(chunk(3000));
        buffer.push(chunk(4000));
        let timestamps: Vec<i64> = buffer.drain_ready().iter().map(|c| c.timestamp_us).collect();
        assert_eq!(timestamps, vec![0, 1000, 2000, 3000, 4000]);
    }

    #[test]
    fn test_epsilon_tolerance() {
        let mut buffer = GapAwareReorder::new();
        buffer.push(chunk(0));
        buffer.push(chunk(1000 + EPSILON_US));
        buffer.push(chunk(3000));
        assert_eq!(buffer.drain_ready().len(), 2);
    }

    #[test]
    fn test_overflow_forces_release() {
        let mut buffer = GapAwareReorder::new();
        buffer.push(chunk(0));
        // A permanent gap, then enough chunks to exceed the cap.
        for i in 0..MAX_PENDING as i64 {
            buffer.push(chunk(1_000_000 + i * 1000));
        }
        let released = buffer.drain_ready();
        assert!(!released.is_empty());
        assert_eq!(released[0].timestamp_us, 0);
    }
}
