use super::params::{AnalysisParameters, ThresholdStrategy};

/// Lag chosen for one frame, before the frequency range check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeriodEstimate {
    /// Integer lag selected by the threshold strategy.
    pub tau: usize,
    /// Lag after parabolic refinement (equal to `tau` when disabled).
    pub refined_tau: f64,
}

impl PeriodEstimate {
    pub fn frequency(&self, sample_rate: u32) -> f64 {
        sample_rate as f64 / self.refined_tau
    }
}

/// Cumulative mean normalized difference function.
///
/// `cmndf(0) = 1`, and a lag whose running sum is still zero (silence) maps
/// to 1 so it can never pass a threshold.
pub fn cmndf(difference: &[f64], out: &mut Vec<f64>) {
    out.clear();
    out.resize(difference.len(), 1.0);
    let mut running_sum = 0.0;
    for tau in 1..difference.len() {
        running_sum += difference[tau];
        out[tau] = if running_sum > 0.0 {
            difference[tau] * tau as f64 / running_sum
        } else {
            1.0
        };
    }
}

/// Select a lag from `cmndf` according to `params.threshold_strategy`.
pub fn estimate_period(
    cmndf: &[f64],
    sample_rate: u32,
    params: &AnalysisParameters,
) -> Option<PeriodEstimate> {
    let tau = match params.threshold_strategy {
        ThresholdStrategy::Simple => simple_threshold(cmndf, params.threshold),
        ThresholdStrategy::Adaptive => {
            let band = lag_band(cmndf.len(), sample_rate, params)?;
            adaptive_threshold(cmndf, band, params.threshold, params.fallback_threshold)
        }
        ThresholdStrategy::FirstDip => {
            let band = lag_band(cmndf.len(), sample_rate, params)?;
            first_dip(cmndf, band, params.threshold)
        }
    }?;

    let refined_tau = if params.interpolation {
        parabolic_interpolation(cmndf, tau)
    } else {
        tau as f64
    };

    Some(PeriodEstimate { tau, refined_tau })
}

/// First lag from 2 upward below `threshold`, walked to the bottom of its dip.
pub fn simple_threshold(cmndf: &[f64], threshold: f64) -> Option<usize> {
    let mut tau = 2;
    while tau < cmndf.len() {
        if cmndf[tau] < threshold {
            while tau + 1 < cmndf.len() && cmndf[tau + 1] < cmndf[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

/// Deepest local minimum below `threshold` inside `band`; failing that, the
/// deepest local minimum in the band if it is below `fallback`.
pub fn adaptive_threshold(
    cmndf: &[f64],
    band: (usize, usize),
    threshold: f64,
    fallback: f64,
) -> Option<usize> {
    // Near-equal dips keep the shorter lag so exact multiples of the period
    // don't win on rounding noise.
    const TIE: f64 = 1e-9;

    let mut deepest: Option<usize> = None;
    for tau in band.0..=band.1 {
        if !is_local_min(cmndf, tau) {
            continue;
        }
        match deepest {
            Some(best) if cmndf[tau] >= cmndf[best] - TIE => {}
            _ => deepest = Some(tau),
        }
    }

    let best = deepest?;
    if cmndf[best] < threshold || cmndf[best] < fallback {
        Some(best)
    } else {
        None
    }
}

/// First local minimum below `threshold` inside `band`.
pub fn first_dip(cmndf: &[f64], band: (usize, usize), threshold: f64) -> Option<usize> {
    (band.0..=band.1).find(|&tau| cmndf[tau] < threshold && is_local_min(cmndf, tau))
}

/// Inclusive lag range admissible for `[min_frequency, max_frequency]`,
/// clipped so every lag has both neighbours.
fn lag_band(len: usize, sample_rate: u32, params: &AnalysisParameters) -> Option<(usize, usize)> {
    if len < 3 {
        return None;
    }
    let sr = sample_rate as f64;
    let lo = ((sr / params.max_frequency).ceil() as usize).max(1);
    let hi = ((sr / params.min_frequency).floor() as usize).min(len - 2);
    (lo <= hi).then_some((lo, hi))
}

fn is_local_min(cmndf: &[f64], tau: usize) -> bool {
    tau >= 1 && tau + 1 < cmndf.len() && cmndf[tau] < cmndf[tau - 1] && cmndf[tau] <= cmndf[tau + 1]
}

/// Vertex of the parabola through `cmndf[τ−1..=τ+1]`.
pub fn parabolic_interpolation(cmndf: &[f64], tau: usize) -> f64 {
    if tau < 1 || tau + 1 >= cmndf.len() {
        return tau as f64;
    }
    let s0 = cmndf[tau - 1];
    let s1 = cmndf[tau];
    let s2 = cmndf[tau + 1];
    let denom = 2.0 * (2.0 * s1 - s2 - s0);
    if denom.abs() < f64::EPSILON {
        return tau as f64;
    }
    let shift = (s2 - s0) / denom;
    // A well-formed minimum never moves the vertex by a full lag
    if shift.abs() >= 1.0 {
        return tau as f64;
    }
    tau as f64 + shift
}
