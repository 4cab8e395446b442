//! The synthesis engine collaborator seam.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sotto_engine::EngineLifecycle;

use crate::error::SynthesisError;

/// Chunks of mono f32 PCM at the engine's native rate.
pub type PcmChunkIter = Box<dyn Iterator<Item = Result<Vec<f32>, SynthesisError>> + Send>;

/// A text-to-speech engine instance.
///
/// `synthesize_stream` returns a blocking iterator of PCM chunks; the
/// synthesizer drives it on the inference pool. Implementations should
/// observe `cancel` between yielded chunks and stop generating promptly.
pub trait TtsEngine: EngineLifecycle {
    fn synthesize_stream(
        &self,
        text: &str,
        voice_id: &str,
        speed: f32,
        cancel: Arc<AtomicBool>,
    ) -> Result<PcmChunkIter, SynthesisError>;

    /// Native output rate of the engine.
    fn sample_rate(&self) -> u32 {
        crate::types::TTS_SAMPLE_RATE
    }
}
