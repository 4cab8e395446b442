//! Synthesis error taxonomy with the stable wire codes.

use thiserror::Error;

/// Synthesis/encoding failures. Each variant carries a stable integer code
/// that goes out on the wire; codes are part of the protocol and must not
/// be renumbered.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("{0}")]
    Generic(String),

    #[error("Model not loaded: {0}")]
    ModelUnloaded(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("No text provided")]
    NoText,

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Speed {0} out of range (0.5-2.0)")]
    SpeedOutOfRange(f32),

    #[error("Invalid format '{0}'. Supported: flac, mp3, opus, pcm, wav")]
    InvalidFormat(String),
}

impl SynthesisError {
    pub fn code(&self) -> u32 {
        match self {
            SynthesisError::Generic(_) => 1,
            SynthesisError::ModelUnloaded(_) => 2,
            SynthesisError::SynthesisFailed(_) => 3,
            SynthesisError::NoText => 4,
            SynthesisError::EncoderUnavailable(_) => 5,
            SynthesisError::SpeedOutOfRange(_) => 6,
            SynthesisError::InvalidFormat(_) => 7,
        }
    }
}
