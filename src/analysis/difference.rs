//! YIN difference function `d(τ) = Σ_{j<W} (x[j] − x[j+τ])²`, `W = N/2`, for
//! `τ ∈ [0, W)`.
//!
//! Three evaluations are available:
//!
//! - [`DifferenceMethod::Direct`] sums the squares directly. O(N²); it is the
//!   reference the others are checked against.
//! - [`DifferenceMethod::Fft`] expands the square into
//!   `e(0) + e(τ) − 2·c(τ)`. The energies `e(τ) = Σ_{j<W} x[j+τ]²` come from a
//!   prefix sum of squares and the cross term `c(τ) = Σ_{j<W} x[j]·x[j+τ]` from
//!   the inverse transform of the cross spectrum of the first half-window and
//!   the whole frame. Numerically equal to `Direct`.
//! - [`DifferenceMethod::FftAutocorrelation`] is the classic shortcut
//!   `d(τ) = 2·(r(0) − r̂(τ))` on the full-frame autocorrelation taken from the
//!   power spectrum, with `r̂` unbiased by the overlap count. It tracks the
//!   direct function's dips for stationary frames but not its exact values.
//!
//! Both transforms zero-pad to the next power of two ≥ `2N − 1`. For the
//! autocorrelation this is what keeps the circular correlation linear: with
//! less padding, lag τ picks up `r(L − τ)` and large lags are silently wrong.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::params::DifferenceMethod;

/// Transform length used for a frame of `frame_size` samples.
pub fn padded_len(frame_size: usize) -> usize {
    (2 * frame_size - 1).next_power_of_two()
}

struct FftPair {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

/// Difference-function evaluator for one frame size.
///
/// Plans are built once and shared; the engine is `Sync` so rayon workers can
/// borrow it.
pub struct DifferenceEngine {
    method: DifferenceMethod,
    frame_size: usize,
    fft: Option<FftPair>,
}

impl DifferenceEngine {
    pub fn new(method: DifferenceMethod, frame_size: usize) -> Self {
        Self::with_fft_len(method, frame_size, padded_len(frame_size))
    }

    /// Engine with an explicit transform length. Only the padding tests need a
    /// length other than [`padded_len`].
    pub(crate) fn with_fft_len(method: DifferenceMethod, frame_size: usize, fft_len: usize) -> Self {
        let fft = match method {
            DifferenceMethod::Direct => None,
            DifferenceMethod::Fft | DifferenceMethod::FftAutocorrelation => {
                let mut planner = FftPlanner::<f64>::new();
                Some(FftPair {
                    len: fft_len,
                    forward: planner.plan_fft_forward(fft_len),
                    inverse: planner.plan_fft_inverse(fft_len),
                })
            }
        };
        Self {
            method,
            frame_size,
            fft,
        }
    }

    pub fn method(&self) -> DifferenceMethod {
        self.method
    }

    /// Number of lags produced per frame.
    pub fn lags(&self) -> usize {
        self.frame_size / 2
    }

    /// Fill `out` with `d(τ)` for `τ ∈ [0, N/2)`.
    pub fn compute(&self, frame: &[f32], out: &mut Vec<f64>) {
        debug_assert_eq!(frame.len(), self.frame_size);
        out.clear();
        out.resize(self.lags(), 0.0);

        match (self.method, &self.fft) {
            (DifferenceMethod::Direct, _) => direct(frame, out),
            (DifferenceMethod::Fft, Some(fft)) => windowed(frame, fft, out),
            (DifferenceMethod::FftAutocorrelation, Some(fft)) => {
                let r = autocorrelation(frame, fft);
                from_autocorrelation(&r, frame.len(), out);
            }
            (_, None) => unreachable!("FFT method without a plan"),
        }
    }
}

fn direct(frame: &[f32], out: &mut [f64]) {
    let half = out.len();
    for (tau, d) in out.iter_mut().enumerate() {
        let mut sum = 0.0f64;
        for j in 0..half {
            let delta = frame[j] as f64 - frame[j + tau] as f64;
            sum += delta * delta;
        }
        *d = sum;
    }
}

fn windowed(frame: &[f32], fft: &FftPair, out: &mut [f64]) {
    let half = out.len();
    let len = fft.len;

    let mut head: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); len];
    let mut whole: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); len];
    for (i, &s) in frame.iter().enumerate() {
        whole[i] = Complex::new(s as f64, 0.0);
        if i < half {
            head[i] = Complex::new(s as f64, 0.0);
        }
    }

    fft.forward.process(&mut head);
    fft.forward.process(&mut whole);

    // Cross spectrum conj(H)·X gives c(τ) = Σ_j h[j]·x[j+τ]
    for (h, x) in head.iter_mut().zip(whole.iter()) {
        *h = h.conj() * x;
    }
    fft.inverse.process(&mut head);
    let scale = 1.0 / len as f64;

    let mut prefix = Vec::with_capacity(frame.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in frame {
        acc += s as f64 * s as f64;
        prefix.push(acc);
    }
    let energy = |tau: usize| prefix[tau + half] - prefix[tau];
    let e0 = energy(0);

    for (tau, d) in out.iter_mut().enumerate() {
        let cross = head[tau].re * scale;
        *d = (e0 + energy(tau) - 2.0 * cross).max(0.0);
    }
    out[0] = 0.0;
}

/// Linear autocorrelation `r(τ) = Σ_{j<N−τ} x[j]·x[j+τ]` for `τ ∈ [0, N)`, via
/// the power spectrum of the zero-padded frame.
fn autocorrelation(frame: &[f32], fft: &FftPair) -> Vec<f64> {
    let len = fft.len;
    let mut buf: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); len];
    for (slot, &s) in buf.iter_mut().zip(frame) {
        *slot = Complex::new(s as f64, 0.0);
    }

    fft.forward.process(&mut buf);
    for c in buf.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    fft.inverse.process(&mut buf);

    let scale = 1.0 / len as f64;
    buf.iter()
        .take(frame.len().min(len))
        .map(|c| c.re * scale)
        .collect()
}

/// `d(τ) ≈ 2·(r(0) − r̂(τ))` with `r̂(τ) = r(τ)·N/(N−τ)`. The raw `r(τ)` sums
/// only `N−τ` products, so plain `2·(r(0) − r(τ))` grows with the lag and
/// drags the CMNDF dips toward long periods. Rescaling to a full-frame sum
/// keeps the dip depth independent of `τ`.
fn from_autocorrelation(r: &[f64], n: usize, out: &mut [f64]) {
    let r0 = r[0];
    for (tau, d) in out.iter_mut().enumerate() {
        let unbiased = r[tau] * n as f64 / (n - tau) as f64;
        *d = (2.0 * (r0 - unbiased)).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn test_frame(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let t = i as f64 / 16000.0;
                (0.6 * (2.0 * PI * 220.0 * t).sin()
                    + 0.25 * (2.0 * PI * 660.0 * t).sin()
                    + 0.1 * (2.0 * PI * 1375.0 * t).cos()) as f32
            })
            .collect()
    }

    fn reference_autocorrelation(frame: &[f32]) -> Vec<f64> {
        (0..frame.len())
            .map(|tau| {
                (0..frame.len() - tau)
                    .map(|j| frame[j] as f64 * frame[j + tau] as f64)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn padded_len_covers_linear_correlation() {
        assert_eq!(padded_len(1024), 2048);
        assert_eq!(padded_len(1000), 2048);
        assert_eq!(padded_len(2048), 4096);
        assert!(padded_len(300) >= 599);
    }

    #[test]
    fn fft_matches_direct() {
        let frame = test_frame(1024);
        let direct_engine = DifferenceEngine::new(DifferenceMethod::Direct, 1024);
        let fft_engine = DifferenceEngine::new(DifferenceMethod::Fft, 1024);

        let mut expected = Vec::new();
        let mut actual = Vec::new();
        direct_engine.compute(&frame, &mut expected);
        fft_engine.compute(&frame, &mut actual);

        assert_eq!(expected.len(), 512);
        assert_eq!(actual.len(), 512);
        let scale = expected.iter().copied().fold(0.0f64, f64::max);
        for (tau, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
            assert!(
                (e - a).abs() <= 1e-9 * scale,
                "lag {}: direct {} fft {}",
                tau,
                e,
                a
            );
        }
    }

    #[test]
    fn padded_autocorrelation_matches_reference() {
        let frame: Vec<f32> = test_frame(512).iter().map(|s| s + 0.5).collect();
        let engine = DifferenceEngine::new(DifferenceMethod::FftAutocorrelation, 512);
        let fft = engine.fft.as_ref().unwrap();
        let r = autocorrelation(&frame, fft);
        let reference = reference_autocorrelation(&frame);
        for tau in 0..512 {
            assert!(
                (r[tau] - reference[tau]).abs() < 1e-8 * reference[0],
                "lag {}: {} vs {}",
                tau,
                r[tau],
                reference[tau]
            );
        }
    }

    #[test]
    fn insufficient_padding_corrupts_large_lags() {
        // DC offset keeps r(N − τ) large, so wraparound cannot hide
        let frame: Vec<f32> = test_frame(512).iter().map(|s| s + 0.5).collect();
        let engine = DifferenceEngine::with_fft_len(DifferenceMethod::FftAutocorrelation, 512, 512);
        let fft = engine.fft.as_ref().unwrap();
        let circular = autocorrelation(&frame, fft);
        let reference = reference_autocorrelation(&frame);

        let small_lag_error = (circular[1] - reference[1]).abs();
        let large_lag_error = (circular[250] - reference[250]).abs();
        assert!(
            large_lag_error > 0.1 * reference[250].abs(),
            "wraparound should be visible at lag 250 ({} vs {})",
            circular[250],
            reference[250]
        );
        assert!(large_lag_error > small_lag_error);

        let mut padded = Vec::new();
        let mut short = Vec::new();
        DifferenceEngine::new(DifferenceMethod::FftAutocorrelation, 512).compute(&frame, &mut padded);
        engine.compute(&frame, &mut short);
        assert!((padded[250] - short[250]).abs() > 1.0);
    }

    #[test]
    fn difference_is_zero_at_lag_zero() {
        let frame = test_frame(256);
        for method in [
            DifferenceMethod::Direct,
            DifferenceMethod::Fft,
            DifferenceMethod::FftAutocorrelation,
        ] {
            let mut d = Vec::new();
            DifferenceEngine::new(method, 256).compute(&frame, &mut d);
            assert!(d[0].abs() < 1e-9, "{:?}: d(0) = {}", method, d[0]);
            assert!(d.iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn silence_gives_flat_zero() {
        let frame = vec![0.0f32; 256];
        let mut d = Vec::new();
        DifferenceEngine::new(DifferenceMethod::Fft, 256).compute(&frame, &mut d);
        assert!(d.iter().all(|v| *v == 0.0));
    }
}
