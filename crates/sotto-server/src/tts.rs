//! The TTS session loop.
//!
//! Text buffers until `end` (or stream close), then synthesis streams
//! encoded audio back: streaming formats emit frames as PCM arrives,
//! buffered formats encode once after the last chunk. `done` is the
//! terminal message; a synthesis error suppresses it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sotto_audio::codec::f32_to_pcm16_bytes;
use sotto_foundation::SessionError;
use sotto_tts::encoder::streaming_encoder;
use sotto_tts::{encode_buffered, AudioFormat, SynthesisError, Synthesizer, TTS_SAMPLE_RATE};

use crate::messages::{TtsClientMessage, TtsServerMessage, TtsSessionConfig, TtsUsage};

pub struct TtsSessionDeps {
    pub synthesizer: Arc<Synthesizer>,
}

fn error_message(e: &SynthesisError) -> TtsServerMessage {
    TtsServerMessage::Error {
        message: e.to_string(),
        code: e.code(),
    }
}

/// Drive one bidirectional TTS stream to completion.
pub async fn run_tts_session<S>(
    mut inbound: S,
    outbound: mpsc::Sender<TtsServerMessage>,
    deps: TtsSessionDeps,
) where
    S: Stream<Item = TtsClientMessage> + Unpin,
{
    // Phase 1: collect config and text until `end` or stream close.
    let mut session_config: Option<TtsSessionConfig> = None;
    let mut text_parts: Vec<String> = Vec::new();
    let mut protocol_errors: Vec<TtsServerMessage> = Vec::new();

    while let Some(message) = inbound.next().await {
        match message {
            TtsClientMessage::Config(config) => {
                if session_config.is_some() {
                    protocol_errors.push(TtsServerMessage::Error {
                        message: SessionError::AlreadyConfigured.to_string(),
                        code: 1,
                    });
                    continue;
                }
                info!(
                    target: "tts",
                    "session configured: voice={}, format={}",
                    config.voice_id,
                    config.response_format.as_deref().unwrap_or("pcm")
                );
                session_config = Some(config);
            }
            TtsClientMessage::Text { text } => {
                if session_config.is_none() {
                    protocol_errors.push(TtsServerMessage::Error {
                        message: SessionError::NotConfigured.to_string(),
                        code: 1,
                    });
                    continue;
                }
                text_parts.push(text);
            }
            TtsClientMessage::End => break,
        }
    }

    if let Some(config) = &session_config {
        let _ = outbound
            .send(TtsServerMessage::Ready {
                voice_id: config.voice_id.clone(),
                sample_rate: TTS_SAMPLE_RATE,
            })
            .await;
    }
    for error in protocol_errors {
        let _ = outbound.send(error).await;
    }

    let Some(config) = session_config else {
        let _ = outbound
            .send(TtsServerMessage::Error {
                message: "No session config received".into(),
                code: 1,
            })
            .await;
        return;
    };

    let full_text = text_parts.join(" ").trim().to_string();
    if full_text.is_empty() {
        let _ = outbound.send(error_message(&SynthesisError::NoText)).await;
        return;
    }

    let format = match AudioFormat::parse(config.response_format.as_deref().unwrap_or("pcm")) {
        Ok(format) => format,
        Err(e) => {
            let _ = outbound.send(error_message(&e)).await;
            return;
        }
    };

    // Phase 2: synthesize and stream.
    let cancel = Arc::new(AtomicBool::new(false));
    let mut pcm_rx = match deps.synthesizer.synthesize(
        &full_text,
        &config.voice_id,
        config.speed,
        Arc::clone(&cancel),
    ) {
        Ok(rx) => rx,
        Err(e) => {
            let _ = outbound.send(error_message(&e)).await;
            return;
        }
    };

    let start = Instant::now();
    let mut audio_samples: u64 = 0;

    let outcome = if format.is_streaming() {
        let mut encoder = match streaming_encoder(format, TTS_SAMPLE_RATE) {
            Ok(encoder) => encoder,
            Err(e) => {
                let _ = outbound.send(error_message(&e)).await;
                return;
            }
        };

        let result = async {
            while let Some(item) = pcm_rx.recv().await {
                let pcm = item?;
                audio_samples += pcm.len() as u64;
                let pcm16 = f32_to_pcm16_bytes(&pcm);
                for frame in encoder.encode(&pcm16)? {
                    if send_audio(&outbound, frame, format, audio_samples, None)
                        .await
                        .is_err()
                    {
                        cancel.store(true, Ordering::Relaxed);
                        return Ok(false);
                    }
                }
            }
            for frame in encoder.flush()? {
                if send_audio(
                    &outbound,
                    frame,
                    format,
                    audio_samples,
                    Some(full_text.clone()),
                )
                .await
                .is_err()
                {
                    return Ok(false);
                }
            }
            Ok::<bool, SynthesisError>(true)
        }
        .await;

        match result {
            Ok(completed) => completed,
            Err(e) => {
                encoder.close();
                warn!(target: "tts", "synthesis error: {}", e);
                let _ = outbound.send(error_message(&e)).await;
                return;
            }
        }
    } else {
        // Buffered formats: accumulate, encode once at the end.
        let mut buffer: Vec<u8> = Vec::new();
        let mut failed: Option<SynthesisError> = None;

        while let Some(item) = pcm_rx.recv().await {
            match item {
                Ok(pcm) => {
                    audio_samples += pcm.len() as u64;
                    buffer.extend(f32_to_pcm16_bytes(&pcm));
                }
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failed {
            warn!(target: "tts", "synthesis error: {}", e);
            let _ = outbound.send(error_message(&e)).await;
            return;
        }

        match encode_buffered(&buffer, TTS_SAMPLE_RATE, format) {
            Ok(encoded) => send_audio(
                &outbound,
                encoded,
                format,
                audio_samples,
                Some(full_text.clone()),
            )
            .await
            .is_ok(),
            Err(e) => {
                warn!(target: "tts", "encoding error: {}", e);
                let _ = outbound.send(error_message(&e)).await;
                return;
            }
        }
    };

    if !outcome {
        debug!(target: "tts", "client went away mid-stream");
        return;
    }

    let audio_ms = audio_samples * 1000 / TTS_SAMPLE_RATE as u64;
    let processing_ms = start.elapsed().as_millis() as u64;
    info!(
        target: "tts",
        "TTS done: {}ms audio, {}ms processing", audio_ms, processing_ms
    );
    let _ = outbound
        .send(TtsServerMessage::Done {
            audio_duration_ms: audio_ms,
            processing_duration_ms: processing_ms,
            text_length: full_text.chars().count(),
            usage: TtsUsage {
                audio_ms,
                processing_ms,
                text_chars: full_text.chars().count(),
            },
            transcript: full_text,
        })
        .await;
}

async fn send_audio(
    outbound: &mpsc::Sender<TtsServerMessage>,
    data: Vec<u8>,
    format: AudioFormat,
    audio_samples: u64,
    transcript: Option<String>,
) -> Result<(), mpsc::error::SendError<TtsServerMessage>> {
    outbound
        .send(TtsServerMessage::Audio {
            data,
            format: format.as_str().to_string(),
            sample_rate: format.output_sample_rate(),
            timestamp_ms: audio_samples * 1000 / TTS_SAMPLE_RATE as u64,
            transcript,
        })
        .await
}
