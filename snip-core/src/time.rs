//! Microsecond time helpers.
//!
//! Every stage boundary in the pipeline speaks microseconds on a
//! zero-based presentation clock; container timescale units exist only
//! inside the demuxer and muxers.

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Convert a value in `1/timescale` units to microseconds.
pub fn ticks_to_us(value: i64, timescale: u32) -> i64 {
    let timescale = i64::from(timescale).max(1);
    // Split to avoid overflow on large tick values.
    let secs = value / timescale;
    let rem = value % timescale;
    secs.saturating_mul(MICROS_PER_SEC)
        .saturating_add(rem.saturating_mul(MICROS_PER_SEC) / timescale)
}

/// Convert microseconds to `1/timescale` units.
pub fn us_to_ticks(us: i64, timescale: u32) -> i64 {
    let timescale = i64::from(timescale).max(1);
    let secs = us / MICROS_PER_SEC;
    let rem = us % MICROS_PER_SEC;
    secs.saturating_mul(timescale)
        .saturating_add(rem.saturating_mul(timescale) / MICROS_PER_SEC)
}

/// A half-open trim window `[start, end)` in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive start.
    pub start_us: i64,
    /// Exclusive end.
    pub end_us: i64,
}

impl TimeRange {
    /// Create a window from microsecond bounds.
    pub fn new(start_us: i64, end_us: i64) -> Self {
        Self { start_us, end_us }
    }

    /// Create a window from second bounds.
    pub fn from_seconds(start: f64, end: f64) -> Self {
        Self {
            start_us: (start * MICROS_PER_SEC as f64) as i64,
            end_us: (end * MICROS_PER_SEC as f64) as i64,
        }
    }

    /// Window length in microseconds.
    pub fn duration_us(&self) -> i64 {
        (self.end_us - self.start_us).max(0)
    }

    /// Whether a timestamp falls inside the window.
    pub fn contains(&self, ts_us: i64) -> bool {
        ts_us >= self.start_us && ts_us < self.end_us
    }

    /// Whether a span `[ts, ts + duration)` overlaps the window.
    pub fn overlaps(&self, ts_us: i64, duration_us: i64) -> bool {
        ts_us < self.end_us && ts_us + duration_us > self.start_us
    }

    /// Whether the window is empty or inverted.
    pub fn is_empty(&self) -> bool {
        self.end_us <= self.start_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_us() {
        assert_eq!(ticks_to_us(90_000, 90_000), MICROS_PER_SEC);
        assert_eq!(ticks_to_us(45_000, 90_000), 500_000);
        assert_eq!(ticks_to_us(0, 90_000), 0);
        // Degenerate timescale must not divide by zero.
        assert_eq!(ticks_to_us(7, 0), 7_000_000);
    }

    #[test]
    fn test_us_to_ticks() {
        assert_eq!(us_to_ticks(MICROS_PER_SEC, 90_000), 90_000);
        assert_eq!(us_to_ticks(500_000, 48_000), 24_000);
    }

    #[test]
    fn test_tick_roundtrip_large() {
        // One hour at 90 kHz must survive the split conversion.
        let ticks = 3_600i64 * 90_000;
        let us = ticks_to_us(ticks, 90_000);
        assert_eq!(us, 3_600 * MICROS_PER_SEC);
        assert_eq!(us_to_ticks(us, 90_000), ticks);
    }

    #[test]
    fn test_range_contains() {
        let r = TimeRange::from_seconds(2.0, 6.0);
        assert!(r.contains(2_000_000));
        assert!(r.contains(5_999_999));
        assert!(!r.contains(6_000_000));
        assert!(!r.contains(1_999_999));
    }

    #[test]
    fn test_range_overlaps() {
        let r = TimeRange::new(2_000_000, 6_000_000);
        // Chunk ending exactly at the window start does not overlap.
        assert!(!r.overlaps(1_000_000, 1_000_000));
        assert!(r.overlaps(1_500_000, 1_000_000));
        assert!(r.overlaps(5_999_999, 33_333));
        assert!(!r.overlaps(6_000_000, 33_333));
    }

    #[test]
    fn test_range_duration() {
        assert_eq!(TimeRange::from_seconds(2.0, 6.0).duration_us(), 4_000_000);
        assert_eq!(TimeRange::new(5, 5).duration_us(), 0);
        assert!(TimeRange::new(6, 5).is_empty());
    }
}
