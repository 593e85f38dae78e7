use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

use super::confidence;
use super::difference::DifferenceEngine;
use super::estimator;
use super::params::AnalysisParameters;
use crate::audio::SampleBuffer;

/// Octave correction applied to a frame by the post-processor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    #[default]
    None,
    /// Multiplied by 2.
    Up2x,
    /// Divided by 2.
    Down2x,
    /// Multiplied by 4.
    Up4x,
    /// Divided by 4.
    Down4x,
}

impl Correction {
    pub fn factor(self) -> f64 {
        match self {
            Correction::None => 1.0,
            Correction::Up2x => 2.0,
            Correction::Down2x => 0.5,
            Correction::Up4x => 4.0,
            Correction::Down4x => 0.25,
        }
    }
}

/// Pitch estimate for one hop. `pitch == 0` means unvoiced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PitchFrame {
    pub pitch: f64,
    pub confidence: f64,
    pub correction: Correction,
    /// Refined lag in samples, 0 when no period was found.
    pub period: f64,
}

impl PitchFrame {
    pub const UNVOICED: PitchFrame = PitchFrame {
        pitch: 0.0,
        confidence: 0.0,
        correction: Correction::None,
        period: 0.0,
    };

    pub fn is_voiced(&self) -> bool {
        self.pitch > 0.0
    }
}

/// Number of full frames that fit in `len` samples.
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    if len < frame_size || hop_size == 0 {
        return 0;
    }
    (len - frame_size) / hop_size + 1
}

/// Run the YIN pipeline over every frame of `buffer`.
///
/// The result has exactly [`frame_count`] entries; frames with no admissible
/// period are [`PitchFrame::UNVOICED`].
pub fn analyze_pitch(buffer: &SampleBuffer, params: &AnalysisParameters) -> Vec<PitchFrame> {
    debug_assert!(params.validate().is_ok(), "unvalidated analysis parameters");

    let samples = buffer.samples();
    let sample_rate = buffer.sample_rate();
    let frames = frame_count(samples.len(), params.frame_size, params.hop_size);
    let started = Instant::now();

    let engine = DifferenceEngine::new(params.difference_method, params.frame_size);

    let track: Vec<PitchFrame> = (0..frames)
        .into_par_iter()
        .map_init(
            || (Vec::with_capacity(engine.lags()), Vec::with_capacity(engine.lags())),
            |(difference, normalized), index| {
                let start = index * params.hop_size;
                let frame = &samples[start..start + params.frame_size];
                analyze_frame(frame, sample_rate, params, &engine, difference, normalized)
            },
        )
        .collect();

    log::debug!(
        "Pitch track: {} frames ({:?}, {:?}) in {:.1}ms",
        track.len(),
        params.difference_method,
        params.threshold_strategy,
        started.elapsed().as_secs_f64() * 1000.0
    );

    track
}

fn analyze_frame(
    frame: &[f32],
    sample_rate: u32,
    params: &AnalysisParameters,
    engine: &DifferenceEngine,
    difference: &mut Vec<f64>,
    normalized: &mut Vec<f64>,
) -> PitchFrame {
    engine.compute(frame, difference);
    estimator::cmndf(difference, normalized);

    let Some(estimate) = estimator::estimate_period(normalized, sample_rate, params) else {
        return PitchFrame::UNVOICED;
    };

    let pitch = estimate.frequency(sample_rate);
    if !in_range(pitch, params) {
        return PitchFrame::UNVOICED;
    }

    PitchFrame {
        pitch,
        confidence: confidence::confidence(frame, normalized, estimate.refined_tau, params),
        correction: Correction::None,
        period: estimate.refined_tau,
    }
}

fn in_range(pitch: f64, params: &AnalysisParameters) -> bool {
    pitch.is_finite() && pitch >= params.min_frequency && pitch <= params.max_frequency
}

/// Voiced ratio and median voiced pitch of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TrackSummary {
    pub frames: usize,
    pub voiced_ratio: f64,
    pub median_pitch: Option<f64>,
    pub mean_confidence: f64,
}

pub fn summarize(track: &[PitchFrame]) -> TrackSummary {
    let mut voiced: Vec<f64> = track.iter().filter(|f| f.is_voiced()).map(|f| f.pitch).collect();
    voiced.sort_by(|a, b| a.total_cmp(b));
    let voiced_ratio = if track.is_empty() {
        0.0
    } else {
        voiced.len() as f64 / track.len() as f64
    };
    let mean_confidence = if track.is_empty() {
        0.0
    } else {
        track.iter().map(|f| f.confidence).sum::<f64>() / track.len() as f64
    };
    TrackSummary {
        frames: track.len(),
        voiced_ratio,
        median_pitch: median_sorted(&voiced),
        mean_confidence,
    }
}

pub(crate) fn median_sorted(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    }
}
