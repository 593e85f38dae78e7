//! Pitch contour and spectrogram engine for tone practice.
//!
//! Audio comes in as a [`SampleBuffer`]; a [`Session`] runs YIN pitch
//! tracking, cleans the contour up, builds a spectrogram and draws both onto
//! one time axis.

pub mod analysis;
pub mod audio;
pub mod error;
pub mod playback;
pub mod render;
pub mod session;

pub use audio::SampleBuffer;
pub use error::{Error, Result};
pub use playback::PlaybackClock;
pub use session::{AnalysisSnapshot, RecomputeJob, RecomputeOutput, Session};
