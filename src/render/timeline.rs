//! Shared horizontal axis for the spectrogram and the pitch overlay.
//!
//! A value at index `i` of a framed signal describes the window centered on
//! sample `i·hop + frame/2`. The spectrogram can only show a slice once its
//! whole window has been heard, so slices are drawn at their window end:
//! center plus half the spectrogram window. Pitch frames and the playback
//! line are pushed by the same delay so that simultaneous features line up.

/// Sample at the center of window `index`.
pub fn center_sample(index: usize, hop_size: usize, frame_size: usize) -> f64 {
    (index * hop_size) as f64 + frame_size as f64 / 2.0
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeAxis {
    sample_rate: f64,
    /// Spectrogram half-window, in samples.
    delay: f64,
    /// Clip length in samples.
    samples: f64,
}

impl TimeAxis {
    pub fn new(samples: usize, sample_rate: u32, spectrogram_fft_size: usize) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            delay: spectrogram_fft_size as f64 / 2.0,
            samples: samples as f64,
        }
    }

    /// Clip duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples / self.sample_rate
    }

    /// Display delay in seconds.
    pub fn delay(&self) -> f64 {
        self.delay / self.sample_rate
    }

    /// Seconds covered by the horizontal axis: the clip plus the delay, so
    /// the last sample is still on screen.
    pub fn span(&self) -> f64 {
        (self.samples + self.delay) / self.sample_rate
    }

    /// Display time of spectrogram slice `index`, `(index·hop + fft)/sr`.
    pub fn slice_time(&self, index: usize, hop_size: usize, fft_size: usize) -> f64 {
        (center_sample(index, hop_size, fft_size) + self.delay) / self.sample_rate
    }

    /// Display time of pitch frame `index`.
    pub fn pitch_time(&self, index: usize, hop_size: usize, frame_size: usize) -> f64 {
        (center_sample(index, hop_size, frame_size) + self.delay) / self.sample_rate
    }

    /// Display time of the playback position at `progress` ∈ [0, 1].
    pub fn progress_time(&self, progress: f64) -> f64 {
        progress.clamp(0.0, 1.0) * self.duration() + self.delay()
    }

    pub fn x_for_time(&self, time: f64, width: u32) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        time / span * width as f64
    }

    /// Inverse of [`TimeAxis::x_for_time`] at the center of pixel column `x`.
    pub fn time_for_x(&self, x: u32, width: u32) -> f64 {
        if width == 0 {
            return 0.0;
        }
        (x as f64 + 0.5) / width as f64 * self.span()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_drawn_at_window_end() {
        let axis = TimeAxis::new(16000, 16000, 1024);
        // (3·128 + 1024) / 16000
        assert!((axis.slice_time(3, 128, 1024) - 1408.0 / 16000.0).abs() < 1e-12);
    }

    #[test]
    fn pitch_and_spectrogram_share_centers() {
        let axis = TimeAxis::new(48000, 16000, 1024);
        // Pitch frame 2 (frame 2048, hop 256) and spectrogram slice 8
        // (fft 1024, hop 128) are both centered on sample 1536.
        assert_eq!(center_sample(2, 256, 2048), 1536.0);
        assert_eq!(center_sample(8, 128, 1024), 1536.0);
        let width = 1280;
        let pitch_x = axis.x_for_time(axis.pitch_time(2, 256, 2048), width);
        let slice_x = axis.x_for_time(axis.slice_time(8, 128, 1024), width);
        assert!((pitch_x - slice_x).abs() < 1e-9);
    }

    #[test]
    fn progress_carries_the_same_delay() {
        let axis = TimeAxis::new(32000, 16000, 4096);
        assert!((axis.progress_time(0.0) - 0.128).abs() < 1e-12);
        assert!((axis.progress_time(1.0) - (2.0 + 0.128)).abs() < 1e-12);
        assert!((axis.progress_time(1.0) - axis.span()).abs() < 1e-12);
        assert_eq!(axis.progress_time(3.0), axis.progress_time(1.0));
    }

    #[test]
    fn x_and_time_are_inverse() {
        let axis = TimeAxis::new(16000, 16000, 512);
        let t = axis.time_for_x(100, 400);
        assert!((axis.x_for_time(t, 400) - 100.5).abs() < 1e-9);
    }
}
