use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use tonescope::analysis::{DifferenceMethod, ParameterPatch, ThresholdStrategy};
use tonescope::render::ColorScheme;

#[derive(Parser, Debug)]
#[command(name = "tonescope", about = "Pitch contour and spectrogram renderer for tone practice")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Config file (defaults to tonescope.toml or the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Render a video with a moving playback line
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Render a single still image
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Playback position (0.0-1.0) of the line drawn on --image
    #[arg(long, default_value_t = 0.0)]
    pub progress: f64,

    /// Write the decoded mono clip as 16-bit WAV
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Write the pitch track as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    // Analysis overrides
    #[arg(long)]
    pub frame_size: Option<usize>,

    #[arg(long)]
    pub hop_size: Option<usize>,

    /// CMNDF threshold (0-1)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Looser threshold for the adaptive strategy
    #[arg(long)]
    pub fallback_threshold: Option<f64>,

    /// Lowest admissible pitch in Hz
    #[arg(long)]
    pub min_freq: Option<f64>,

    /// Highest admissible pitch in Hz
    #[arg(long)]
    pub max_freq: Option<f64>,

    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Disable parabolic lag refinement
    #[arg(long)]
    pub no_interpolation: bool,

    /// Disable the RMS confidence gate
    #[arg(long)]
    pub no_power_gate: bool,

    /// RMS below which confidence is zero
    #[arg(long)]
    pub power_floor: Option<f64>,

    /// Median filter length (odd)
    #[arg(long)]
    pub median_window: Option<usize>,

    #[arg(long)]
    pub no_octave_correction: bool,

    /// Absolute tolerance around octave-jump ratios
    #[arg(long)]
    pub octave_tolerance: Option<f64>,

    // Spectrogram overrides
    #[arg(long)]
    pub fft_size: Option<usize>,

    #[arg(long)]
    pub spectrogram_hop: Option<usize>,

    #[arg(long)]
    pub spectrogram_max_freq: Option<f64>,

    // View
    /// Video width in pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Bottom of the visible frequency range in Hz
    #[arg(long)]
    pub view_min_hz: Option<f64>,

    /// Top of the visible frequency range in Hz
    #[arg(long)]
    pub view_max_hz: Option<f64>,

    #[arg(long, value_enum)]
    pub colors: Option<SchemeArg>,

    #[arg(long)]
    pub brightness: Option<f64>,

    #[arg(long)]
    pub contrast: Option<f64>,

    // Output
    /// Frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MethodArg {
    Direct,
    Fft,
    FftAutocorrelation,
}

impl From<MethodArg> for DifferenceMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Direct => DifferenceMethod::Direct,
            MethodArg::Fft => DifferenceMethod::Fft,
            MethodArg::FftAutocorrelation => DifferenceMethod::FftAutocorrelation,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Simple,
    Adaptive,
    FirstDip,
}

impl From<StrategyArg> for ThresholdStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Simple => ThresholdStrategy::Simple,
            StrategyArg::Adaptive => ThresholdStrategy::Adaptive,
            StrategyArg::FirstDip => ThresholdStrategy::FirstDip,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SchemeArg {
    Grayscale,
    Heat,
    Magma,
}

impl From<SchemeArg> for ColorScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Grayscale => ColorScheme::Grayscale,
            SchemeArg::Heat => ColorScheme::Heat,
            SchemeArg::Magma => ColorScheme::Magma,
        }
    }
}

impl Cli {
    /// Analysis flags given on the command line, as a patch over the config.
    pub fn analysis_patch(&self) -> ParameterPatch {
        ParameterPatch {
            frame_size: self.frame_size,
            hop_size: self.hop_size,
            threshold: self.threshold,
            fallback_threshold: self.fallback_threshold,
            min_frequency: self.min_freq,
            max_frequency: self.max_freq,
            interpolation: self.no_interpolation.then_some(false),
            difference_method: self.method.map(Into::into),
            threshold_strategy: self.strategy.map(Into::into),
            power_confidence_adjust: self.no_power_gate.then_some(false),
            min_power_threshold: self.power_floor,
            median_window: self.median_window,
            octave_correction: self.no_octave_correction.then_some(false),
            octave_ratio_threshold: self.octave_tolerance,
        }
    }
}
