//! Merged, throttled progress reporting.
//!
//! Each track reports its own fraction (muxed timestamp over window
//! length); the sink merges them into a single externally observed value
//! that is monotonically non-decreasing and emitted at a fixed rate rather
//! than on every internal event. The final call is exactly `1.0`, and
//! nothing is emitted after a failure.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Caller-supplied progress observer. Receives fractions in `[0, 1]`.
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;

const EMIT_INTERVAL: Duration = Duration::from_millis(100);

struct ProgressState {
    fractions: Vec<f64>,
    last_emitted: f64,
    last_emit_at: Option<Instant>,
    closed: bool,
}

/// Shared sink merging per-track progress into one callback stream.
pub struct ProgressSink {
    callback: Option<ProgressCallback>,
    state: Mutex<ProgressState>,
}

impl ProgressSink {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            state: Mutex::new(ProgressState {
                fractions: Vec::new(),
                last_emitted: 0.0,
                last_emit_at: None,
                closed: false,
            }),
        }
    }

    /// Register one track; returns its slot.
    pub fn register_track(&self) -> usize {
        let mut state = self.state.lock();
        state.fractions.push(0.0);
        state.fractions.len() - 1
    }

    /// Report one track's fraction. Emission is throttled and clamped so
    /// the caller only ever sees a non-decreasing sequence.
    pub fn report(&self, track: usize, fraction: f64) {
        let Some(callback) = &self.callback else {
            return;
        };
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Some(slot) = state.fractions.get_mut(track) {
            *slot = slot.max(fraction.clamp(0.0, 1.0));
        }

        let merged = merged_fraction(&state.fractions);
        let due = state
            .last_emit_at
            .map_or(true, |at| at.elapsed() >= EMIT_INTERVAL);
        if due && merged > state.last_emitted {
            // Hold 1.0 back for `complete`.
            let value = merged.min(0.999);
            state.last_emitted = value;
            state.last_emit_at = Some(Instant::now());
            drop(state);
            callback(value);
        }
    }

    /// Emit the final `1.0` and close the sink.
    pub fn complete(&self) {
        let Some(callback) = &self.callback else {
            return;
        };
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        callback(1.0);
    }

    /// Close without emitting; the callback never fires after an error.
    pub fn fail(&self) {
        self.state.lock().closed = true;
    }
}

fn merged_fraction(fractions: &[f64]) -> f64 {
    if fractions.is_empty() {
        return 0.0;
    }
    fractions.iter().sum::<f64>() / fractions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording_sink() -> (Arc<Mutex<Vec<f64>>>, ProgressSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&seen);
        let sink = ProgressSink::new(Some(Box::new(move |f| writer.lock().push(f))));
        (seen, sink)
    }

    #[test]
    fn test_merged_and_monotonic() {
        let (seen, sink) = recording_sink();
        let video = sink.register_track();
        let audio = sink.register_track();

        sink.report(video, 0.5);
        // Throttled: second report inside the interval stays silent.
        sink.report(audio, 0.5);
        sink.complete();

        let seen = seen.lock();
        assert_eq!(seen.first(), Some(&0.25));
        assert_eq!(seen.last(), Some(&1.0));
        for pair in seen.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_complete_emits_exactly_one_final() {
        let (seen, sink) = recording_sink();
        sink.register_track();
        sink.complete();
        sink.complete();
        assert_eq!(*seen.lock(), vec![1.0]);
    }

    #[test]
    fn test_nothing_after_fail() {
        let (seen, sink) = recording_sink();
        let track = sink.register_track();
        sink.fail();
        sink.report(track, 0.9);
        sink.complete();
        assert!(seen.lock().is_empty());
    }
}
