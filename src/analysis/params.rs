use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the YIN difference function is evaluated for each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceMethod {
    /// O(n²) sum of squared differences.
    Direct,
    /// Same sum evaluated through FFT cross-correlation and energy prefix sums.
    Fft,
    /// Unbiased full-frame autocorrelation from the power spectrum.
    FftAutocorrelation,
}

/// How the period is picked from the normalized difference function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    Simple,
    Adaptive,
    FirstDip,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParameters {
    pub frame_size: usize,
    pub hop_size: usize,
    pub threshold: f64,
    /// Looser threshold used by the adaptive strategy when nothing dips below
    /// `threshold`.
    pub fallback_threshold: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub interpolation: bool,
    pub difference_method: DifferenceMethod,
    pub threshold_strategy: ThresholdStrategy,
    pub power_confidence_adjust: bool,
    /// RMS floor below which confidence is forced to zero.
    pub min_power_threshold: f64,
    pub median_window: usize,
    pub octave_correction: bool,
    /// Absolute tolerance around the 2, 1/2, 4, 1/4 ratios.
    pub octave_ratio_threshold: f64,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 256,
            threshold: 0.15,
            fallback_threshold: 0.35,
            min_frequency: 50.0,
            max_frequency: 1000.0,
            interpolation: true,
            difference_method: DifferenceMethod::Fft,
            threshold_strategy: ThresholdStrategy::Simple,
            power_confidence_adjust: true,
            min_power_threshold: 0.01,
            median_window: 5,
            octave_correction: true,
            octave_ratio_threshold: 0.1,
        }
    }
}

impl AnalysisParameters {
    /// Reject structurally invalid values before they reach the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 8 {
            return Err(Error::param(format!(
                "frame_size must be at least 8, got {}",
                self.frame_size
            )));
        }
        if self.frame_size % 2 != 0 {
            return Err(Error::param(format!(
                "frame_size must be even, got {}",
                self.frame_size
            )));
        }
        if self.hop_size == 0 {
            return Err(Error::param("hop_size must be positive"));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::param(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if !(self.fallback_threshold >= self.threshold && self.fallback_threshold <= 1.0) {
            return Err(Error::param(format!(
                "fallback_threshold must be in [threshold, 1], got {}",
                self.fallback_threshold
            )));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return Err(Error::param(format!(
                "frequency range {}..{} Hz is empty",
                self.min_frequency, self.max_frequency
            )));
        }
        if !(self.min_power_threshold >= 0.0 && self.min_power_threshold.is_finite()) {
            return Err(Error::param("min_power_threshold must be a finite value >= 0"));
        }
        if self.median_window == 0 || self.median_window % 2 == 0 {
            return Err(Error::param(format!(
                "median_window must be odd and >= 1, got {}",
                self.median_window
            )));
        }
        // 0.25 and 0.5 are the closest targets; their windows must not meet
        if !(self.octave_ratio_threshold > 0.0 && self.octave_ratio_threshold < 0.125) {
            return Err(Error::param(format!(
                "octave_ratio_threshold must be in (0, 0.125), got {}",
                self.octave_ratio_threshold
            )));
        }
        Ok(())
    }

    /// Checks that only make sense once the sample rate is known. Mismatches are
    /// logged rather than rejected: the affected frames simply come out unvoiced.
    pub fn warn_for_sample_rate(&self, sample_rate: u32) {
        let sr = sample_rate as f64;
        if self.max_frequency > sr / 2.0 {
            log::warn!(
                "max_frequency {:.0} Hz is above Nyquist ({:.0} Hz)",
                self.max_frequency,
                sr / 2.0
            );
        }
        let longest_period = sr / self.min_frequency;
        if longest_period >= (self.frame_size / 2) as f64 {
            log::warn!(
                "min_frequency {:.1} Hz needs a lag of {:.0} samples but frame_size {} only searches up to {}",
                self.min_frequency,
                longest_period,
                self.frame_size,
                self.frame_size / 2
            );
        }
    }

    /// Merge `patch` into a copy of `self`, reporting which stages it invalidates.
    pub fn merged(&self, patch: &ParameterPatch) -> (Self, RecomputeScope) {
        let mut next = self.clone();
        let mut scope = RecomputeScope::NOTHING;

        macro_rules! apply {
            ($field:ident, $stage:expr) => {
                if let Some(v) = patch.$field {
                    if next.$field != v {
                        next.$field = v;
                        scope = scope.union($stage);
                    }
                }
            };
        }

        apply!(frame_size, RecomputeScope::PITCH_TRACK);
        apply!(hop_size, RecomputeScope::PITCH_TRACK);
        apply!(threshold, RecomputeScope::PITCH_TRACK);
        apply!(fallback_threshold, RecomputeScope::PITCH_TRACK);
        apply!(min_frequency, RecomputeScope::PITCH_TRACK);
        apply!(max_frequency, RecomputeScope::PITCH_TRACK);
        apply!(interpolation, RecomputeScope::PITCH_TRACK);
        apply!(difference_method, RecomputeScope::PITCH_TRACK);
        apply!(threshold_strategy, RecomputeScope::PITCH_TRACK);
        apply!(power_confidence_adjust, RecomputeScope::PITCH_TRACK);
        apply!(min_power_threshold, RecomputeScope::PITCH_TRACK);
        apply!(median_window, RecomputeScope::POST_PROCESS);
        apply!(octave_correction, RecomputeScope::POST_PROCESS);
        apply!(octave_ratio_threshold, RecomputeScope::POST_PROCESS);

        (next, scope)
    }
}

/// Partial update from the parameter control surface.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterPatch {
    pub frame_size: Option<usize>,
    pub hop_size: Option<usize>,
    pub threshold: Option<f64>,
    pub fallback_threshold: Option<f64>,
    pub min_frequency: Option<f64>,
    pub max_frequency: Option<f64>,
    pub interpolation: Option<bool>,
    pub difference_method: Option<DifferenceMethod>,
    pub threshold_strategy: Option<ThresholdStrategy>,
    pub power_confidence_adjust: Option<bool>,
    pub min_power_threshold: Option<f64>,
    pub median_window: Option<usize>,
    pub octave_correction: Option<bool>,
    pub octave_ratio_threshold: Option<f64>,
}

impl From<&AnalysisParameters> for ParameterPatch {
    /// A patch that sets every field.
    fn from(p: &AnalysisParameters) -> Self {
        Self {
            frame_size: Some(p.frame_size),
            hop_size: Some(p.hop_size),
            threshold: Some(p.threshold),
            fallback_threshold: Some(p.fallback_threshold),
            min_frequency: Some(p.min_frequency),
            max_frequency: Some(p.max_frequency),
            interpolation: Some(p.interpolation),
            difference_method: Some(p.difference_method),
            threshold_strategy: Some(p.threshold_strategy),
            power_confidence_adjust: Some(p.power_confidence_adjust),
            min_power_threshold: Some(p.min_power_threshold),
            median_window: Some(p.median_window),
            octave_correction: Some(p.octave_correction),
            octave_ratio_threshold: Some(p.octave_ratio_threshold),
        }
    }
}

/// Which parts of the cached analysis a change invalidates.
///
/// Re-running the pitch track always re-runs post-processing after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecomputeScope {
    pub pitch_track: bool,
    pub post_process: bool,
    pub spectrogram: bool,
}

impl RecomputeScope {
    pub const NOTHING: RecomputeScope = RecomputeScope {
        pitch_track: false,
        post_process: false,
        spectrogram: false,
    };
    pub const POST_PROCESS: RecomputeScope = RecomputeScope {
        pitch_track: false,
        post_process: true,
        spectrogram: false,
    };
    pub const PITCH_TRACK: RecomputeScope = RecomputeScope {
        pitch_track: true,
        post_process: true,
        spectrogram: false,
    };
    pub const SPECTROGRAM: RecomputeScope = RecomputeScope {
        pitch_track: false,
        post_process: false,
        spectrogram: true,
    };
    pub const FULL: RecomputeScope = RecomputeScope {
        pitch_track: true,
        post_process: true,
        spectrogram: true,
    };

    pub fn union(self, other: RecomputeScope) -> RecomputeScope {
        RecomputeScope {
            pitch_track: self.pitch_track || other.pitch_track,
            post_process: self.post_process || other.post_process,
            spectrogram: self.spectrogram || other.spectrogram,
        }
    }

    pub fn is_empty(self) -> bool {
        self == RecomputeScope::NOTHING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AnalysisParameters::default().validate().unwrap();
    }

    #[test]
    fn rejects_even_median_window() {
        let params = AnalysisParameters {
            median_window: 4,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn octave_tolerance_keeps_targets_apart() {
        let wide = AnalysisParameters {
            octave_ratio_threshold: 0.125,
            ..Default::default()
        };
        assert!(wide.validate().is_err());
        let narrow = AnalysisParameters {
            octave_ratio_threshold: 0.12,
            ..Default::default()
        };
        narrow.validate().unwrap();
    }

    #[test]
    fn rejects_zero_hop() {
        let params = AnalysisParameters {
            hop_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_inverted_frequency_range() {
        let params = AnalysisParameters {
            min_frequency: 500.0,
            max_frequency: 100.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn post_process_patch_has_narrow_scope() {
        let base = AnalysisParameters::default();
        let patch = ParameterPatch {
            median_window: Some(3),
            octave_correction: Some(false),
            ..Default::default()
        };
        let (next, scope) = base.merged(&patch);
        assert_eq!(scope, RecomputeScope::POST_PROCESS);
        assert_eq!(next.median_window, 3);
        assert!(!next.octave_correction);
    }

    #[test]
    fn unchanged_values_do_not_invalidate() {
        let base = AnalysisParameters::default();
        let patch = ParameterPatch {
            hop_size: Some(base.hop_size),
            ..Default::default()
        };
        assert!(base.merged(&patch).1.is_empty());
    }

    #[test]
    fn pipeline_patch_widens_scope() {
        let base = AnalysisParameters::default();
        let patch = ParameterPatch {
            median_window: Some(7),
            threshold_strategy: Some(ThresholdStrategy::FirstDip),
            ..Default::default()
        };
        let scope = base.merged(&patch).1;
        assert_eq!(scope, RecomputeScope::PITCH_TRACK);
        assert!(scope.post_process);
        assert!(!scope.spectrogram);
    }

    #[test]
    fn full_patch_reproduces_target() {
        let base = AnalysisParameters::default();
        let target = AnalysisParameters {
            octave_ratio_threshold: 0.05,
            ..Default::default()
        };
        let (next, scope) = base.merged(&ParameterPatch::from(&target));
        assert_eq!(next, target);
        assert_eq!(scope, RecomputeScope::POST_PROCESS);
        assert!(target.merged(&ParameterPatch::from(&target)).1.is_empty());
    }

    #[test]
    fn scope_union_covers_both_branches() {
        let both = RecomputeScope::POST_PROCESS.union(RecomputeScope::SPECTROGRAM);
        assert!(both.post_process && both.spectrogram);
        assert!(!both.pitch_track);
        assert_eq!(
            RecomputeScope::PITCH_TRACK.union(RecomputeScope::SPECTROGRAM),
            RecomputeScope::FULL
        );
    }
}
