//! Voice activity detection for sotto.
//!
//! The segmentation state machine (`VadProcessor`) is model-agnostic: any
//! backend that can report speech spans inside an audio window implements
//! [`VadModel`]. The neural model is an external collaborator; `energy.rs`
//! carries a deterministic energy-based implementation used in tests and
//! model-free deployments.

pub mod config;
pub mod energy;
pub mod processor;
pub mod types;

pub use config::VadConfig;
pub use energy::EnergyVad;
pub use processor::{VadProcessor, VAD_WINDOW_MS};
pub use types::{SpeechSegment, SpeechSpan, VadEvent};

pub use sotto_foundation::VadError;

/// Span-reporting interface over a fixed audio window.
///
/// Implementations are shared process-wide across sessions, so they take
/// `&self` and do any internal caching under their own locks.
pub trait VadModel: Send + Sync {
    /// Report speech spans (sample offsets) inside `audio`, a mono 16 kHz
    /// window. Parameters mirror the usual Silero-style knobs.
    fn speech_spans(
        &self,
        audio: &[f32],
        threshold: f32,
        min_silence_duration_ms: u32,
        speech_pad_ms: u32,
        min_speech_duration_ms: u32,
    ) -> Result<Vec<SpeechSpan>, VadError>;
}
