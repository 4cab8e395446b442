//! The transcription engine collaborator seam.

use sotto_engine::EngineLifecycle;
use sotto_foundation::SttError;

use crate::types::Transcript;

/// A speech-to-text engine instance.
///
/// Implementations wrap one loaded model. They are shared read-only across
/// sessions after load, so `transcribe` takes `&self`; any mutable decoder
/// state lives behind the implementation's own lock. Lifecycle (load/unload)
/// is driven by the engine pool, serialised on the wrapper lock.
pub trait SttEngine: EngineLifecycle {
    /// Transcribe one utterance of canonical 16 kHz mono audio.
    fn transcribe(
        &self,
        audio: &[f32],
        language: Option<&str>,
        word_timestamps: bool,
    ) -> Result<Transcript, SttError>;

    /// The sample rate the engine expects; producers resample to this.
    fn sample_rate(&self) -> u32 {
        16_000
    }
}
