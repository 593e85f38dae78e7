use std::sync::Arc;

use crate::error::{Error, Result};

/// Fully decoded PCM clip.
///
/// Samples are shared behind an `Arc` so the session, in-flight jobs and
/// snapshots can hold the same clip without copying. A new capture or load
/// replaces the whole buffer; nothing mutates it in place.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidBuffer("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(Error::InvalidBuffer("channel count must be at least 1".into()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::InvalidBuffer(format!(
                "non-finite sample at index {}",
                pos
            )));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count reported by the source. Analysis treats the samples as
    /// mono; interleaved multi-channel data is only meaningful for export.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds of one channel.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(SampleBuffer::mono(vec![0.0; 10], 0).is_err());
    }

    #[test]
    fn rejects_non_finite_samples() {
        let err = SampleBuffer::mono(vec![0.0, f32::NAN, 0.0], 16000).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn duration_accounts_for_channels() {
        let buf = SampleBuffer::new(vec![0.0; 48000], 24000, 2).unwrap();
        assert!((buf.duration() - 1.0).abs() < 1e-9);
        assert_eq!(buf.len(), 48000);
    }
}
