//! Decoded audio abstractions.

use std::fmt;

/// A run of decoded audio samples.
///
/// Samples are stored planar (one `Vec<f32>` per channel), each plane
/// holding `frame_count` samples.
#[derive(Clone)]
pub struct AudioData {
    /// One plane per channel.
    pub planes: Vec<Vec<f32>>,
    /// Samples per second.
    pub sample_rate: u32,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: i64,
}

impl AudioData {
    /// Create from planar channel data.
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32, timestamp_us: i64) -> Self {
        Self {
            planes,
            sample_rate,
            timestamp_us,
        }
    }

    /// Create from interleaved samples.
    pub fn from_interleaved(
        samples: &[f32],
        channels: usize,
        sample_rate: u32,
        timestamp_us: i64,
    ) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels
        };
        let mut planes = vec![Vec::with_capacity(frames); channels.max(1)];
        for frame in 0..frames {
            for (ch, plane) in planes.iter_mut().enumerate() {
                plane.push(samples[frame * channels + ch]);
            }
        }
        Self {
            planes,
            sample_rate,
            timestamp_us,
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Samples per channel.
    pub fn frame_count(&self) -> usize {
        self.planes.first().map_or(0, |p| p.len())
    }

    /// Duration of this run in microseconds.
    pub fn duration_us(&self) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        crate::time::ticks_to_us(self.frame_count() as i64, self.sample_rate)
    }

    /// End of the run's span.
    pub fn end_us(&self) -> i64 {
        self.timestamp_us + self.duration_us()
    }

    /// Keep only the samples whose timestamps fall at or after `start_us`,
    /// adjusting the run's timestamp. Returns `false` when nothing remains.
    pub fn clip_front(&mut self, start_us: i64) -> bool {
        if start_us <= self.timestamp_us {
            return self.frame_count() > 0;
        }
        let offset_us = start_us - self.timestamp_us;
        let skip = crate::time::us_to_ticks(offset_us, self.sample_rate) as usize;
        if skip >= self.frame_count() {
            for plane in &mut self.planes {
                plane.clear();
            }
            return false;
        }
        for plane in &mut self.planes {
            plane.drain(..skip);
        }
        self.timestamp_us = start_us;
        true
    }

    /// Drop samples at or past `end_us`. Returns `false` when nothing remains.
    pub fn clip_back(&mut self, end_us: i64) -> bool {
        if end_us >= self.end_us() {
            return self.frame_count() > 0;
        }
        if end_us <= self.timestamp_us {
            for plane in &mut self.planes {
                plane.clear();
            }
            return false;
        }
        let keep_us = end_us - self.timestamp_us;
        let keep = crate::time::us_to_ticks(keep_us, self.sample_rate) as usize;
        for plane in &mut self.planes {
            plane.truncate(keep);
        }
        self.frame_count() > 0
    }
}

impl fmt::Debug for AudioData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioData")
            .field("channels", &self.channel_count())
            .field("frames", &self.frame_count())
            .field("sample_rate", &self.sample_rate)
            .field("timestamp_us", &self.timestamp_us)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved() {
        let samples = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let audio = AudioData::from_interleaved(&samples, 2, 48_000, 0);
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frame_count(), 3);
        assert_eq!(audio.planes[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(audio.planes[1], vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_duration() {
        let audio = AudioData::new(vec![vec![0.0; 48_000]], 48_000, 0);
        assert_eq!(audio.duration_us(), 1_000_000);
    }

    #[test]
    fn test_clip_front() {
        // 10 samples at 1 MHz so one sample per microsecond.
        let mut audio = AudioData::new(vec![(0..10).map(|i| i as f32).collect()], 1_000_000, 100);
        assert!(audio.clip_front(104));
        assert_eq!(audio.frame_count(), 6);
        assert_eq!(audio.timestamp_us, 104);
        assert_eq!(audio.planes[0][0], 4.0);
    }

    #[test]
    fn test_clip_back() {
        let mut audio = AudioData::new(vec![(0..10).map(|i| i as f32).collect()], 1_000_000, 100);
        assert!(audio.clip_back(107));
        assert_eq!(audio.frame_count(), 7);
        assert_eq!(audio.end_us(), 107);
    }

    #[test]
    fn test_clip_to_empty() {
        let mut audio = AudioData::new(vec![vec![0.0; 4]], 1_000_000, 100);
        assert!(!audio.clip_front(200));
        assert_eq!(audio.frame_count(), 0);
    }
}
