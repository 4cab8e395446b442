//! Chunked synthesis with CPU fallback and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, warn};

use sotto_engine::{is_oom_error, EngineManager};

use crate::chunker::{chunk_text, MAX_CHUNK_CHARS};
use crate::engine::TtsEngine;
use crate::error::SynthesisError;
use crate::types::SynthesisConfig;

/// Depth of the PCM hand-off channel; back-pressure comes from the consumer
/// draining slower than synthesis.
const CHANNEL_DEPTH: usize = 16;

/// Drives the synthesis engine chunk by chunk, yielding f32 PCM buffers
/// through a bounded channel.
///
/// Cancellation is observed between chunks and between yielded frames. An
/// OOM on one chunk retries only that chunk after the engine pool falls
/// back; any other failure ends the stream with an error item.
pub struct Synthesizer {
    engine_manager: Arc<EngineManager<dyn TtsEngine>>,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(engine_manager: Arc<EngineManager<dyn TtsEngine>>, config: SynthesisConfig) -> Self {
        Self {
            engine_manager,
            config,
        }
    }

    /// Start synthesis. Validation failures (speed range) surface
    /// immediately; everything after that arrives on the returned channel,
    /// terminated either by channel close (success) or one `Err` item.
    pub fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        speed: Option<f32>,
        cancel: Arc<AtomicBool>,
    ) -> Result<mpsc::Receiver<Result<Vec<f32>, SynthesisError>>, SynthesisError> {
        let speed = speed.unwrap_or(self.config.speed);
        if !(0.5..=2.0).contains(&speed) {
            return Err(SynthesisError::SpeedOutOfRange(speed));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

        let text = text.trim().to_string();
        if text.is_empty() {
            // Nothing to synthesize; the caller observes an empty, closed
            // stream (the protocol-level no-text error is the handler's
            // call).
            return Ok(rx);
        }

        let engine_manager = Arc::clone(&self.engine_manager);
        let fallback_to_cpu = self.config.fallback_to_cpu;
        let voice_id = voice_id.to_string();

        tokio::task::spawn_blocking(move || {
            let chunks = chunk_text(&text, MAX_CHUNK_CHARS);
            let start = Instant::now();
            let mut used_cpu_fallback = false;

            for chunk in &chunks {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }

                let result = run_chunk(&engine_manager, chunk, &voice_id, speed, &cancel, &tx);
                match result {
                    Ok(()) => {}
                    Err(e) if is_oom_error(&e.to_string()) && fallback_to_cpu => {
                        warn!(
                            target: "tts",
                            "TTS OOM, retrying chunk on fallback engine: {}", e
                        );
                        used_cpu_fallback = true;
                        if !engine_manager.try_fallback() {
                            let _ = tx.blocking_send(Err(SynthesisError::SynthesisFailed(
                                format!("no fallback after OOM: {}", e),
                            )));
                            return;
                        }
                        if let Err(cpu_e) =
                            run_chunk(&engine_manager, chunk, &voice_id, speed, &cancel, &tx)
                        {
                            let _ = tx.blocking_send(Err(SynthesisError::SynthesisFailed(
                                format!("CPU fallback synthesis failed: {}", cpu_e),
                            )));
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        return;
                    }
                }
            }

            info!(
                target: "tts",
                "synthesized {} chars ({} chunks) in {:.2}s on {}",
                text.chars().count(),
                chunks.len(),
                start.elapsed().as_secs_f32(),
                if used_cpu_fallback { "fallback" } else { "primary" }
            );
        });

        Ok(rx)
    }
}

/// Synthesize one text chunk, forwarding PCM buffers until the chunk ends,
/// the client cancels, or the consumer goes away.
fn run_chunk(
    engine_manager: &Arc<EngineManager<dyn TtsEngine>>,
    chunk: &str,
    voice_id: &str,
    speed: f32,
    cancel: &Arc<AtomicBool>,
    tx: &mpsc::Sender<Result<Vec<f32>, SynthesisError>>,
) -> Result<(), SynthesisError> {
    let guard = engine_manager
        .get(None)
        .acquire()
        .map_err(|e| SynthesisError::SynthesisFailed(e.to_string()))?;

    let stream = guard.synthesize_stream(chunk, voice_id, speed, Arc::clone(cancel))?;
    for item in stream {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let pcm = item?;
        if tx.blocking_send(Ok(pcm)).is_err() {
            // Consumer dropped the receiver; treat like cancellation.
            break;
        }
    }
    Ok(())
}
