use super::params::AnalysisParameters;

/// Root mean square of a frame.
pub fn rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| s as f64 * s as f64).sum();
    (sum / frame.len() as f64).sqrt()
}

/// Periodicity score `1 − cmndf(round(τ'))`, clamped to `[0, 1]`.
pub fn periodicity(cmndf: &[f64], refined_tau: f64) -> f64 {
    let idx = (refined_tau.round().max(0.0) as usize).min(cmndf.len().saturating_sub(1));
    match cmndf.get(idx) {
        Some(v) => (1.0 - v).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Confidence for a voiced frame. When power adjustment is on, a frame whose
/// RMS is under the floor scores zero however periodic it looks.
pub fn confidence(frame: &[f32], cmndf: &[f64], refined_tau: f64, params: &AnalysisParameters) -> f64 {
    if params.power_confidence_adjust && rms(frame) < params.min_power_threshold {
        return 0.0;
    }
    periodicity(cmndf, refined_tau)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let frame: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&frame) - 1.0).abs() < 1e-12);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn periodicity_uses_rounded_lag() {
        let cmndf = vec![1.0, 0.9, 0.4, 0.05, 0.3];
        assert!((periodicity(&cmndf, 2.6) - 0.95).abs() < 1e-12);
        assert!((periodicity(&cmndf, 2.4) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn periodicity_is_clamped() {
        let cmndf = vec![1.0, 1.7, 0.2];
        assert_eq!(periodicity(&cmndf, 1.0), 0.0);
        assert_eq!(periodicity(&cmndf, 40.0), 0.8);
    }

    #[test]
    fn power_gate_dominates_periodicity() {
        let quiet = vec![0.001f32; 128];
        let cmndf = vec![1.0, 0.5, 0.0, 0.5];
        let params = AnalysisParameters {
            min_power_threshold: 0.01,
            ..Default::default()
        };
        assert_eq!(confidence(&quiet, &cmndf, 2.0, &params), 0.0);

        let ungated = AnalysisParameters {
            power_confidence_adjust: false,
            ..params
        };
        assert_eq!(confidence(&quiet, &cmndf, 2.0, &ungated), 1.0);
    }
}
