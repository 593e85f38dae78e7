//! Error types for tonescope.
//!
//! Unvoiced frames and superseded recomputes are not errors; they are
//! represented in the data (`pitch == 0`) or dropped silently by the session.

use thiserror::Error;

/// Result type alias using tonescope's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The audio container or codec could not be decoded.
    #[error("Failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV container could not be read or written.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// A WAV file parsed but is not 16-bit PCM.
    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    /// Sample buffer rejected before it reached the pipeline.
    #[error("Invalid sample buffer: {0}")]
    InvalidBuffer(String),

    /// Analysis, spectrogram or view parameter outside its valid range.
    ///
    /// Raised at the parameter boundary; the pipeline itself assumes
    /// validated parameters.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    pub(crate) fn param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}
