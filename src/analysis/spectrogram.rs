use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::track::frame_count;
use crate::audio::SampleBuffer;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramSettings {
    /// Transform size in samples; a power of two.
    pub fft_size: usize,
    pub hop_size: usize,
    /// Highest frequency kept in the matrix.
    pub max_frequency: f64,
    /// Magnitudes at or below this map to 0.
    pub min_decibels: f64,
    /// Magnitudes at or above this map to 255.
    pub max_decibels: f64,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            hop_size: 128,
            max_frequency: 1500.0,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl SpectrogramSettings {
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 16 || !self.fft_size.is_power_of_two() {
            return Err(Error::param(format!(
                "spectrogram fft_size must be a power of two >= 16, got {}",
                self.fft_size
            )));
        }
        if self.hop_size == 0 {
            return Err(Error::param("spectrogram hop_size must be positive"));
        }
        if !(self.max_frequency > 0.0) {
            return Err(Error::param("spectrogram max_frequency must be positive"));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(Error::param(format!(
                "decibel range {}..{} is empty",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }
}

/// Short-time magnitude spectra, `[slice][bin]`, normalized to 0–255.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrogramMatrix {
    slices: Vec<Vec<u8>>,
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
    bins: usize,
}

impl SpectrogramMatrix {
    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn num_bins(&self) -> usize {
        self.bins
    }

    pub fn slice(&self, index: usize) -> &[u8] {
        &self.slices[index]
    }

    pub fn get(&self, slice: usize, bin: usize) -> u8 {
        self.slices[slice][bin]
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Width of one frequency bin in Hz.
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Highest frequency covered by the kept bins.
    pub fn max_frequency(&self) -> f64 {
        self.bins.saturating_sub(1) as f64 * self.bin_hz()
    }
}

/// Compute the spectrogram of `buffer` with a Hann window.
pub fn build_spectrogram(buffer: &SampleBuffer, settings: &SpectrogramSettings) -> SpectrogramMatrix {
    debug_assert!(settings.validate().is_ok(), "unvalidated spectrogram settings");

    let samples = buffer.samples();
    let sr = buffer.sample_rate();
    let fft_size = settings.fft_size;
    let half = fft_size / 2;
    let bin_hz = sr as f64 / fft_size as f64;
    let bins = ((settings.max_frequency / bin_hz).floor() as usize + 1).min(half);
    let slices = frame_count(samples.len(), fft_size, settings.hop_size);
    let started = Instant::now();

    let hann = hann_window(fft_size);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let db_span = settings.max_decibels - settings.min_decibels;

    let matrix: Vec<Vec<u8>> = (0..slices)
        .into_par_iter()
        .map(|slice_idx| {
            let start = slice_idx * settings.hop_size;
            let mut fft_input: Vec<Complex<f32>> = samples[start..start + fft_size]
                .iter()
                .zip(hann.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut fft_input);

            fft_input[..bins]
                .iter()
                .map(|c| {
                    let magnitude = c.norm() as f64 / fft_size as f64;
                    let db = 20.0 * magnitude.max(1e-12).log10();
                    let scaled = (db - settings.min_decibels) / db_span * 255.0;
                    scaled.clamp(0.0, 255.0) as u8
                })
                .collect()
        })
        .collect();

    log::debug!(
        "Spectrogram: {} slices x {} bins in {:.1}ms",
        matrix.len(),
        bins,
        started.elapsed().as_secs_f64() * 1000.0
    );

    SpectrogramMatrix {
        slices: matrix,
        sample_rate: sr,
        fft_size,
        hop_size: settings.hop_size,
        bins,
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, n: usize) -> SampleBuffer {
        let samples = (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        SampleBuffer::mono(samples, sample_rate).unwrap()
    }

    #[test]
    fn slice_and_bin_counts() {
        let buffer = tone(440.0, 16000, 16000);
        let settings = SpectrogramSettings {
            fft_size: 1024,
            hop_size: 256,
            max_frequency: 1000.0,
            ..Default::default()
        };
        let spec = build_spectrogram(&buffer, &settings);
        assert_eq!(spec.num_slices(), (16000 - 1024) / 256 + 1);
        // 15.625 Hz bins, 0..=1000 Hz
        assert_eq!(spec.num_bins(), 65);
        assert!(spec.max_frequency() <= 1000.0);
        assert!(spec.slice(0).len() == 65);
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let buffer = tone(500.0, 16000, 8192);
        let settings = SpectrogramSettings {
            fft_size: 1024,
            hop_size: 512,
            ..Default::default()
        };
        let spec = build_spectrogram(&buffer, &settings);
        let expected_bin = (500.0 / spec.bin_hz()).round() as usize;
        for s in 0..spec.num_slices() {
            let slice = spec.slice(s);
            let peak = (0..slice.len()).max_by_key(|&b| slice[b]).unwrap();
            assert!(peak.abs_diff(expected_bin) <= 1, "slice {} peak {}", s, peak);
            assert!(slice[expected_bin] > 200);
        }
    }

    #[test]
    fn silence_maps_to_zero() {
        let buffer = SampleBuffer::mono(vec![0.0; 4096], 16000).unwrap();
        let settings = SpectrogramSettings {
            fft_size: 1024,
            ..Default::default()
        };
        let spec = build_spectrogram(&buffer, &settings);
        assert!(spec.num_slices() > 0);
        assert!((0..spec.num_slices()).all(|s| spec.slice(s).iter().all(|&v| v == 0)));
    }

    #[test]
    fn short_buffer_has_no_slices() {
        let buffer = SampleBuffer::mono(vec![0.1; 100], 16000).unwrap();
        let spec = build_spectrogram(&buffer, &SpectrogramSettings::default());
        assert_eq!(spec.num_slices(), 0);
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let bad_size = SpectrogramSettings {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(bad_size.validate().is_err());
        let bad_db = SpectrogramSettings {
            min_decibels: -20.0,
            max_decibels: -30.0,
            ..Default::default()
        };
        assert!(bad_db.validate().is_err());
        assert!(SpectrogramSettings::default().validate().is_ok());
    }
}
