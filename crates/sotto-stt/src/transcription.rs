//! Single-utterance and batch transcription over the engine pool.

use std::sync::Arc;

use tracing::{info, warn};

use sotto_audio::codec::preprocess_encoded;
use sotto_engine::{is_oom_error, EngineManager, MAX_OOM_RETRIES};
use sotto_foundation::SttError;

use crate::engine::SttEngine;
use crate::text::merge_transcripts;
use crate::types::Transcript;

/// Transcription front-end: OOM retry + fallback for live segments, and the
/// chunk/merge path for long encoded recordings.
pub struct TranscriptionService {
    engine_manager: Arc<EngineManager<dyn SttEngine>>,
}

impl TranscriptionService {
    pub fn new(engine_manager: Arc<EngineManager<dyn SttEngine>>) -> Arc<Self> {
        Arc::new(Self { engine_manager })
    }

    pub fn engine_manager(&self) -> &Arc<EngineManager<dyn SttEngine>> {
        &self.engine_manager
    }

    /// Transcribe one utterance. OOM-family failures consult the engine
    /// pool's fallback chain and retry, bounded by `MAX_OOM_RETRIES`; any
    /// other failure propagates immediately.
    pub fn transcribe(
        &self,
        audio: &[f32],
        language: Option<&str>,
        word_timestamps: bool,
        model_id: Option<&str>,
    ) -> Result<Transcript, SttError> {
        let mut last_error: Option<SttError> = None;

        for attempt in 1..=MAX_OOM_RETRIES {
            let outcome = self
                .engine_manager
                .get(model_id)
                .acquire()
                .map_err(SttError::from)
                .and_then(|engine| engine.transcribe(audio, language, word_timestamps));

            match outcome {
                Ok(transcript) => return Ok(transcript),
                Err(e) if is_oom_error(&e.to_string()) => {
                    warn!(
                        target: "stt",
                        "OOM on attempt {}/{}: {}", attempt, MAX_OOM_RETRIES, e
                    );
                    last_error = Some(e);
                    // Rotate models / flip the device; even when the chain
                    // is exhausted the remaining attempts may clear a
                    // transient allocation failure.
                    self.engine_manager.try_fallback();
                }
                Err(e) => return Err(e),
            }
        }

        Err(SttError::OomRetriesExhausted {
            attempts: MAX_OOM_RETRIES,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".into()),
        })
    }

    /// Decode a containerised recording, split it into 5-minute chunks,
    /// transcribe each, and merge.
    pub fn transcribe_encoded(
        &self,
        data: &[u8],
        format_hint: Option<&str>,
        language: Option<&str>,
        word_timestamps: bool,
        model_id: Option<&str>,
    ) -> Result<Transcript, SttError> {
        let chunks = preprocess_encoded(data, format_hint)?;
        let total_ms: u64 = chunks.iter().map(|c| c.duration_ms).sum();
        info!(
            target: "stt",
            "transcribing encoded audio: {}ms ({} chunk(s))",
            total_ms,
            chunks.len()
        );

        if chunks.len() == 1 {
            return self.transcribe(&chunks[0].samples, language, word_timestamps, model_id);
        }

        let chunk_count = chunks.len();
        let mut parts: Vec<(Transcript, f64)> = Vec::with_capacity(chunk_count);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let offset_s = chunk.offset_ms as f64 / 1000.0;
            info!(
                target: "stt",
                "transcribing chunk {}/{} (offset: {:.1}s)",
                i + 1,
                chunk_count,
                offset_s
            );
            let transcript =
                self.transcribe(&chunk.samples, language, word_timestamps, model_id)?;
            parts.push((transcript, offset_s));
        }

        let merged = merge_transcripts(parts)?;
        info!(target: "stt", "all {} chunks transcribed", chunk_count);
        Ok(merged)
    }

    /// `transcribe` on the blocking pool, for async callers.
    pub async fn transcribe_async(
        self: &Arc<Self>,
        audio: Vec<f32>,
        language: Option<String>,
        word_timestamps: bool,
        model_id: Option<String>,
    ) -> Result<Transcript, SttError> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            service.transcribe(
                &audio,
                language.as_deref(),
                word_timestamps,
                model_id.as_deref(),
            )
        })
        .await
        .map_err(|e| SttError::TranscriptionFailed(format!("transcription task failed: {}", e)))?
    }

}
