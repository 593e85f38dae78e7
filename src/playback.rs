use std::time::{Duration, Instant};

/// Wall-clock playback position for the progress line.
///
/// The audio itself is played by an external transport; this only tracks
/// how far into the clip that transport should be.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    duration: Duration,
    started: Option<Instant>,
}

impl PlaybackClock {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    /// Fraction of the clip played at `now`, clamped to [0, 1]. `None` when
    /// stopped.
    pub fn fraction_at(&self, now: Instant) -> Option<f64> {
        let started = self.started?;
        if self.duration.is_zero() {
            return Some(1.0);
        }
        let elapsed = now.saturating_duration_since(started);
        Some((elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0))
    }

    /// True once playback has reached the end of the clip.
    pub fn is_finished(&self, now: Instant) -> bool {
        self.fraction_at(now).is_some_and(|f| f >= 1.0)
    }
}
