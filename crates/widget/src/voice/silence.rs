//! Silence-triggered auto-stop for voice capture.

use std::time::{Duration, Instant};

/// RMS level below which a frame counts as silent.
pub const SILENCE_RMS_THRESHOLD: f32 = 0.01;
/// Continuous silence required before recording stops on its own.
pub const SILENCE_TIMEOUT: Duration = Duration::from_millis(1300);

/// Root-mean-square of normalized `[-1.0, 1.0]` samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// RMS of unsigned 8-bit time-domain bytes centred on 128.
pub fn byte_frame_rms(frame: &[u8]) -> f32 {
    let samples: Vec<f32> = frame
        .iter()
        .map(|byte| (f32::from(*byte) - 128.0) / 128.0)
        .collect();
    rms(&samples)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SilenceDecision {
    Sound,
    /// Silent, but not yet for long enough.
    Silence,
    AutoStop,
}

/// Tracks how long the input has stayed below the silence threshold.
///
/// Any frame at or above the threshold disarms the timer; the next silent frame
/// re-arms it from that frame's timestamp.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold: f32,
    timeout: Duration,
    silent_since: Option<Instant>,
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(SILENCE_RMS_THRESHOLD, SILENCE_TIMEOUT)
    }
}

impl SilenceDetector {
    pub fn new(threshold: f32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            silent_since: None,
        }
    }

    /// Feeds one frame's RMS level observed at `at`.
    pub fn observe(&mut self, level: f32, at: Instant) -> SilenceDecision {
        if level >= self.threshold {
            self.silent_since = None;
            return SilenceDecision::Sound;
        }

        let since = *self.silent_since.get_or_insert(at);
        self.decide(since, at)
    }

    /// Checks the timer without a new frame.
    pub fn poll(&self, now: Instant) -> SilenceDecision {
        match self.silent_since {
            Some(since) => self.decide(since, now),
            None => SilenceDecision::Sound,
        }
    }

    pub fn reset(&mut self) {
        self.silent_since = None;
    }

    fn decide(&self, since: Instant, now: Instant) -> SilenceDecision {
        if now.saturating_duration_since(since) >= self.timeout {
            SilenceDecision::AutoStop
        } else {
            SilenceDecision::Silence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(start: Instant, offset: u64) -> Instant {
        start + Duration::from_millis(offset)
    }

    #[test]
    fn sustained_silence_stops_at_timeout() {
        let start = Instant::now();
        let mut detector = SilenceDetector::default();

        for offset in (0..1300).step_by(100) {
            assert_ne!(
                detector.observe(0.0, ms(start, offset)),
                SilenceDecision::AutoStop
            );
        }
        assert_eq!(
            detector.observe(0.0, ms(start, 1300)),
            SilenceDecision::AutoStop
        );
    }

    #[test]
    fn loud_frame_resets_timer() {
        let start = Instant::now();
        let mut detector = SilenceDetector::default();

        detector.observe(0.0, start);
        assert_eq!(
            detector.observe(0.5, ms(start, 1200)),
            SilenceDecision::Sound
        );
        assert_eq!(
            detector.observe(0.0, ms(start, 1300)),
            SilenceDecision::Silence
        );
        assert_eq!(
            detector.observe(0.0, ms(start, 2500)),
            SilenceDecision::Silence
        );
        assert_eq!(detector.poll(ms(start, 2600)), SilenceDecision::AutoStop);
    }

    #[test]
    fn threshold_level_counts_as_sound() {
        let start = Instant::now();
        let mut detector = SilenceDetector::default();

        assert_eq!(
            detector.observe(SILENCE_RMS_THRESHOLD, start),
            SilenceDecision::Sound
        );
        assert_eq!(detector.poll(ms(start, 1300)), SilenceDecision::Sound);

        detector.observe(0.0, ms(start, 100));
        assert_eq!(
            detector.observe(SILENCE_RMS_THRESHOLD, ms(start, 1000)),
            SilenceDecision::Sound
        );
        assert_eq!(detector.poll(ms(start, 1400)), SilenceDecision::Sound);
    }

    #[test]
    fn byte_frames_centre_on_128() {
        assert_eq!(byte_frame_rms(&[128; 32]), 0.0);
        assert!(byte_frame_rms(&[255, 0, 255, 0]) > 0.9);
        assert_eq!(rms(&[]), 0.0);
    }
}
