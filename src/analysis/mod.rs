pub mod confidence;
pub mod difference;
pub mod estimator;
pub mod params;
pub mod postprocess;
pub mod spectrogram;
pub mod track;

pub use params::{AnalysisParameters, DifferenceMethod, ParameterPatch, RecomputeScope, ThresholdStrategy};
pub use spectrogram::{build_spectrogram, SpectrogramMatrix, SpectrogramSettings};
pub use track::{analyze_pitch, frame_count, summarize, Correction, PitchFrame, TrackSummary};
pub use postprocess::post_process;
