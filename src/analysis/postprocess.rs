//! Pitch track clean-up: median outlier removal followed by octave-jump
//! correction.
//!
//! Octave correction runs two independent sweeps over the same filtered track,
//! one left to right and one right to left. Each sweep is a pure function that
//! returns its proposed correction per frame; [`merge_proposals`] keeps a
//! correction only where both sweeps proposed the same one. A single sweep
//! through a short noisy stretch tends to cascade, and the mirror sweep does not
//! cascade the same way.

use super::params::AnalysisParameters;
use super::track::{median_sorted, Correction, PitchFrame};

/// Ratio targets with the correction each one proposes.
const OCTAVE_TARGETS: [(f64, Correction); 4] = [
    (2.0, Correction::Down2x),
    (0.5, Correction::Up2x),
    (4.0, Correction::Down4x),
    (0.25, Correction::Up4x),
];

/// Median filter followed (when enabled) by octave correction.
pub fn post_process(raw: &[PitchFrame], params: &AnalysisParameters) -> Vec<PitchFrame> {
    let filtered = median_filter(raw, params.median_window);
    if !params.octave_correction {
        return filtered;
    }
    let forward = forward_sweep(&filtered, params);
    let backward = backward_sweep(&filtered, params);
    let corrected = merge_proposals(&filtered, &forward, &backward);

    let count = corrected
        .iter()
        .filter(|f| f.correction != Correction::None)
        .count();
    if count > 0 {
        log::debug!("Octave correction applied to {} of {} frames", count, corrected.len());
    }
    corrected
}

/// Replace each frame's pitch by the median of the voiced pitches in its
/// window. A frame whose window holds no voiced pitch is kept as is.
/// Confidences and corrections pass through, so a filled dropout stays at
/// confidence 0.
pub fn median_filter(track: &[PitchFrame], window: usize) -> Vec<PitchFrame> {
    debug_assert!(window % 2 == 1, "median window must be odd");
    let half = window / 2;
    if half == 0 {
        return track.to_vec();
    }

    let mut scratch = Vec::with_capacity(window);
    track
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(track.len() - 1);
            scratch.clear();
            scratch.extend(
                track[lo..=hi]
                    .iter()
                    .filter(|f| f.is_voiced())
                    .map(|f| f.pitch),
            );
            scratch.sort_by(|a, b| a.total_cmp(b));
            match median_sorted(&scratch) {
                Some(pitch) => PitchFrame { pitch, ..*frame },
                None => *frame,
            }
        })
        .collect()
}

/// Left-to-right proposals.
pub fn forward_sweep(track: &[PitchFrame], params: &AnalysisParameters) -> Vec<Correction> {
    sweep(track, 0..track.len(), |i| i.checked_sub(1), params)
}

/// Right-to-left proposals.
pub fn backward_sweep(track: &[PitchFrame], params: &AnalysisParameters) -> Vec<Correction> {
    let len = track.len();
    sweep(track, (0..len).rev(), |i| (i + 1 < len).then_some(i + 1), params)
}

fn sweep(
    track: &[PitchFrame],
    order: impl Iterator<Item = usize>,
    neighbour: impl Fn(usize) -> Option<usize>,
    params: &AnalysisParameters,
) -> Vec<Correction> {
    let mut proposals = vec![Correction::None; track.len()];
    // Pitch after this sweep's own corrections, used as the reference for the
    // next frame in sweep order.
    let mut corrected: Vec<f64> = track.iter().map(|f| f.pitch).collect();

    for i in order {
        if !track[i].is_voiced() {
            continue;
        }
        let Some(n) = neighbour(i) else { continue };
        if !track[n].is_voiced() {
            continue;
        }
        let ratio = track[i].pitch / corrected[n];
        if let Some(correction) = classify_ratio(ratio, params.octave_ratio_threshold) {
            let candidate = track[i].pitch * correction.factor();
            if candidate >= params.min_frequency && candidate <= params.max_frequency {
                proposals[i] = correction;
                corrected[i] = candidate;
            }
        }
    }
    proposals
}

/// Correction for a frame-to-neighbour pitch ratio, if it is within
/// `tolerance` of an octave jump. The nearest target wins.
pub fn classify_ratio(ratio: f64, tolerance: f64) -> Option<Correction> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return None;
    }
    OCTAVE_TARGETS
        .iter()
        .map(|&(target, correction)| ((ratio - target).abs(), correction))
        .filter(|&(distance, _)| distance <= tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, correction)| correction)
}

/// Apply a correction only where both sweeps proposed the same one.
pub fn merge_proposals(
    track: &[PitchFrame],
    forward: &[Correction],
    backward: &[Correction],
) -> Vec<PitchFrame> {
    debug_assert_eq!(track.len(), forward.len());
    debug_assert_eq!(track.len(), backward.len());
    track
        .iter()
        .zip(forward.iter().zip(backward))
        .map(|(frame, (&f, &b))| {
            if f == b && f != Correction::None {
                PitchFrame {
                    pitch: frame.pitch * f.factor(),
                    correction: f,
                    ..*frame
                }
            } else {
                PitchFrame {
                    correction: Correction::None,
                    ..*frame
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced(pitch: f64) -> PitchFrame {
        PitchFrame {
            pitch,
            confidence: 0.9,
            correction: Correction::None,
            period: 16000.0 / pitch,
        }
    }

    fn track(pitches: &[f64]) -> Vec<PitchFrame> {
        pitches
            .iter()
            .map(|&p| if p > 0.0 { voiced(p) } else { PitchFrame::UNVOICED })
            .collect()
    }

    fn pitches(track: &[PitchFrame]) -> Vec<f64> {
        track.iter().map(|f| f.pitch).collect()
    }

    fn params() -> AnalysisParameters {
        AnalysisParameters {
            min_frequency: 60.0,
            max_frequency: 800.0,
            median_window: 1,
            octave_ratio_threshold: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn median_removes_single_outlier() {
        let input = track(&[200.0, 201.0, 199.0, 400.0, 200.0, 202.0, 198.0]);
        let out = median_filter(&input, 3);
        assert!((out[3].pitch - 200.0).abs() <= 2.0, "{}", out[3].pitch);
        assert_eq!(out[3].confidence, 0.9);
        for f in &out {
            assert!((f.pitch - 200.0).abs() <= 2.0);
        }
    }

    #[test]
    fn median_keeps_the_middle_of_unvoiced_spans() {
        let input = track(&[200.0, 0.0, 0.0, 0.0, 210.0]);
        let out = median_filter(&input, 3);
        assert_eq!(pitches(&out), vec![200.0, 200.0, 0.0, 210.0, 210.0]);
        assert_eq!(out[2], PitchFrame::UNVOICED);
    }

    #[test]
    fn median_fills_single_dropout() {
        let input = track(&[200.0, 200.0, 0.0, 200.0, 200.0]);
        let out = median_filter(&input, 3);
        assert_eq!(out[2].pitch, 200.0);
        assert_eq!(out[2].confidence, 0.0);
        assert_eq!(out[2].correction, Correction::None);
    }

    #[test]
    fn median_ignores_unvoiced_neighbours() {
        let input = track(&[0.0, 300.0, 0.0]);
        let out = median_filter(&input, 3);
        assert_eq!(out[1].pitch, 300.0);
    }

    #[test]
    fn median_window_one_is_identity() {
        let input = track(&[100.0, 400.0, 100.0]);
        assert_eq!(median_filter(&input, 1), input);
    }

    #[test]
    fn classify_ratio_targets() {
        assert_eq!(classify_ratio(2.05, 0.1), Some(Correction::Down2x));
        assert_eq!(classify_ratio(0.48, 0.1), Some(Correction::Up2x));
        assert_eq!(classify_ratio(3.95, 0.1), Some(Correction::Down4x));
        assert_eq!(classify_ratio(0.26, 0.1), Some(Correction::Up4x));
        assert_eq!(classify_ratio(0.42, 0.1), Some(Correction::Up2x));
        assert_eq!(classify_ratio(0.2, 0.1), Some(Correction::Up4x));
        assert_eq!(classify_ratio(2.11, 0.1), None);
        assert_eq!(classify_ratio(1.0, 0.1), None);
        assert_eq!(classify_ratio(1.5, 0.1), None);
        assert_eq!(classify_ratio(0.0, 0.1), None);
    }

    #[test]
    fn overlapping_windows_pick_nearest_target() {
        // 0.36 is 0.11 from 0.25 and 0.14 from 0.5
        assert_eq!(classify_ratio(0.36, 0.2), Some(Correction::Up4x));
        assert_eq!(classify_ratio(0.4, 0.2), Some(Correction::Up2x));
    }

    #[test]
    fn agreed_halving_flattens_track() {
        let f = 150.0;
        let input = track(&[f, 2.0 * f, f, 2.0 * f, f, 2.0 * f, f]);
        let p = params();
        let forward = forward_sweep(&input, &p);
        let backward = backward_sweep(&input, &p);
        assert_eq!(forward, backward);

        let out = post_process(&input, &p);
        for (i, frame) in out.iter().enumerate() {
            assert!((frame.pitch - f).abs() < 1e-9, "frame {}: {}", i, frame.pitch);
            let expected = if i % 2 == 1 {
                Correction::Down2x
            } else {
                Correction::None
            };
            assert_eq!(frame.correction, expected);
        }
    }

    #[test]
    fn disagreement_is_left_alone() {
        // A doubled first frame has no left neighbour: the forward sweep
        // instead doubles everything after it, the backward sweep halves the
        // first frame. Nothing matches.
        let input = track(&[300.0, 150.0, 150.0, 150.0]);
        let p = params();
        let forward = forward_sweep(&input, &p);
        let backward = backward_sweep(&input, &p);
        assert_eq!(
            forward,
            vec![Correction::None, Correction::Up2x, Correction::Up2x, Correction::Up2x]
        );
        assert_eq!(
            backward,
            vec![Correction::Down2x, Correction::None, Correction::None, Correction::None]
        );

        let out = post_process(&input, &p);
        assert_eq!(pitches(&out), pitches(&input));
        assert!(out.iter().all(|f| f.correction == Correction::None));
    }

    #[test]
    fn correction_respects_frequency_limits() {
        // Halving the 400 Hz spike lands on 200 Hz, which must be in range
        let input = track(&[200.0, 400.0, 200.0]);
        let p = AnalysisParameters {
            min_frequency: 150.0,
            ..params()
        };
        let forward = forward_sweep(&input, &p);
        assert_eq!(forward[1], Correction::Down2x);
        let lower = AnalysisParameters {
            min_frequency: 250.0,
            max_frequency: 800.0,
            ..params()
        };
        assert_eq!(forward_sweep(&input, &lower)[1], Correction::None);
    }

    #[test]
    fn unvoiced_gap_breaks_the_chain() {
        let input = track(&[150.0, 0.0, 300.0, 300.0]);
        let p = params();
        assert!(forward_sweep(&input, &p).iter().all(|c| *c == Correction::None));
    }

    #[test]
    fn disabled_correction_only_filters() {
        let input = track(&[150.0, 300.0, 150.0]);
        let p = AnalysisParameters {
            octave_correction: false,
            ..params()
        };
        assert_eq!(post_process(&input, &p), input);
    }

    #[test]
    fn quarter_jumps_are_corrected() {
        let input = track(&[100.0, 100.0, 400.0, 100.0, 100.0]);
        let out = post_process(&input, &params());
        assert_eq!(out[2].correction, Correction::Down4x);
        assert!((out[2].pitch - 100.0).abs() < 1e-9);
    }
}
