//! The STT session loop.
//!
//! Message handling is single-threaded per stream; pipeline work (VAD
//! inference, transcription) runs on a dedicated blocking worker fed over a
//! bounded channel, so RPC I/O never waits on model latency. Events flow
//! back through the outbound sender in causal order.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sotto_audio::codec::pcm16_bytes_to_f32;
use sotto_audio::resampler::resample_buffer;
use sotto_audio::{samples_to_ms, OpusStreamDecoder, SAMPLE_RATE_HZ};
use sotto_foundation::SessionError;
use sotto_stt::{
    EouModel, PartialTranscriptService, PipelineEvent, SessionConfig, SpeechSession, SttPipeline,
    SttPipelineConfig, TranscriptionService,
};
use sotto_vad::VadModel;

use crate::messages::{SttClientMessage, SttServerMessage};

/// Everything a stream needs to build its pipeline.
pub struct SttSessionDeps {
    pub transcription: Arc<TranscriptionService>,
    pub vad_model: Arc<dyn VadModel>,
    pub eou_model: Arc<dyn EouModel>,
    pub pipeline_config: SttPipelineConfig,
}

enum WorkerCommand {
    Frame(Vec<f32>),
    Encoded {
        data: Vec<u8>,
        format: Option<String>,
    },
    Flush,
}

struct SessionWorker {
    cmd_tx: mpsc::Sender<WorkerCommand>,
    handle: tokio::task::JoinHandle<()>,
    config: SessionConfig,
}

fn not_configured() -> SttServerMessage {
    SttServerMessage::Error {
        message: SessionError::NotConfigured.to_string(),
        code: None,
    }
}

/// Drive one bidirectional STT stream to completion.
pub async fn run_stt_session<S>(
    mut inbound: S,
    outbound: mpsc::Sender<SttServerMessage>,
    deps: SttSessionDeps,
) where
    S: Stream<Item = SttClientMessage> + Unpin,
{
    let mut worker: Option<SessionWorker> = None;
    let mut opus_decoder: Option<OpusStreamDecoder> = None;

    while let Some(message) = inbound.next().await {
        match message {
            SttClientMessage::Config(config) => {
                if worker.is_some() {
                    let _ = outbound
                        .send(SttServerMessage::Error {
                            message: SessionError::AlreadyConfigured.to_string(),
                            code: None,
                        })
                        .await;
                    continue;
                }
                info!(
                    target: "stt",
                    "session configured: language={}, sample_rate={}, partials={}",
                    config.language,
                    config.sample_rate,
                    config.partials
                );
                worker = Some(spawn_worker(&deps, config, outbound.clone()));
                let _ = outbound.send(SttServerMessage::Ready).await;
            }

            SttClientMessage::Audio { pcm16, sample_rate } => {
                let Some(active) = &worker else {
                    let _ = outbound.send(not_configured()).await;
                    continue;
                };

                let audio = match pcm16_bytes_to_f32(&pcm16) {
                    Ok(audio) => audio,
                    Err(e) => {
                        let _ = outbound
                            .send(SttServerMessage::Error {
                                message: e.to_string(),
                                code: Some("decode_error".into()),
                            })
                            .await;
                        continue;
                    }
                };
                let src_rate = sample_rate.unwrap_or(active.config.sample_rate);
                match to_canonical(&audio, src_rate) {
                    Ok(audio) => {
                        if active.cmd_tx.send(WorkerCommand::Frame(audio)).await.is_err() {
                            warn!(target: "stt", "pipeline worker gone, dropping frame");
                        }
                    }
                    Err(message) => {
                        let _ = outbound
                            .send(SttServerMessage::Error {
                                message,
                                code: Some("decode_error".into()),
                            })
                            .await;
                    }
                }
            }

            SttClientMessage::OpusFrame {
                data,
                sample_rate,
                channels,
            } => {
                let Some(active) = &worker else {
                    let _ = outbound.send(not_configured()).await;
                    continue;
                };

                if opus_decoder.is_none() {
                    let rate = sample_rate.unwrap_or(sotto_audio::OPUS_SAMPLE_RATE);
                    let chans = channels.unwrap_or(1) as usize;
                    match OpusStreamDecoder::new(rate, chans) {
                        Ok(decoder) => opus_decoder = Some(decoder),
                        Err(e) => {
                            let _ = outbound
                                .send(SttServerMessage::Error {
                                    message: e.to_string(),
                                    code: Some("decode_error".into()),
                                })
                                .await;
                            continue;
                        }
                    }
                }
                let Some(decoder) = opus_decoder.as_mut() else {
                    continue;
                };
                let decoded = decoder
                    .decode(&data)
                    .and_then(|audio| {
                        resample_buffer(&audio, decoder.sample_rate(), SAMPLE_RATE_HZ)
                            .map_err(Into::into)
                    });
                match decoded {
                    Ok(audio) => {
                        if active.cmd_tx.send(WorkerCommand::Frame(audio)).await.is_err() {
                            warn!(target: "stt", "pipeline worker gone, dropping frame");
                        }
                    }
                    Err(e) => {
                        let _ = outbound
                            .send(SttServerMessage::Error {
                                message: e.to_string(),
                                code: Some("decode_error".into()),
                            })
                            .await;
                    }
                }
            }

            SttClientMessage::EncodedAudio { data, format } => {
                let Some(active) = &worker else {
                    let _ = outbound.send(not_configured()).await;
                    continue;
                };
                if active
                    .cmd_tx
                    .send(WorkerCommand::Encoded { data, format })
                    .await
                    .is_err()
                {
                    warn!(target: "stt", "pipeline worker gone, dropping encoded audio");
                }
            }

            SttClientMessage::EndOfStream => break,
        }
    }

    // Termination: flush remaining session audio, then let the worker wind
    // down.
    if let Some(active) = worker.take() {
        let _ = active.cmd_tx.send(WorkerCommand::Flush).await;
        drop(active.cmd_tx);
        let _ = active.handle.await;
    }
    debug!(target: "stt", "session closed");
}

fn to_canonical(audio: &[f32], src_rate: u32) -> Result<Vec<f32>, String> {
    if src_rate == SAMPLE_RATE_HZ {
        return Ok(audio.to_vec());
    }
    resample_buffer(audio, src_rate, SAMPLE_RATE_HZ).map_err(|e| e.to_string())
}

fn spawn_worker(
    deps: &SttSessionDeps,
    config: SessionConfig,
    outbound: mpsc::Sender<SttServerMessage>,
) -> SessionWorker {
    let pipeline = SttPipeline::new(
        Arc::clone(&deps.transcription),
        Arc::clone(&deps.vad_model),
        Arc::clone(&deps.eou_model),
        deps.pipeline_config.clone(),
        config.clone(),
    );
    let partial_service = PartialTranscriptService::new(Arc::clone(&deps.transcription));
    let transcription = Arc::clone(&deps.transcription);

    // Enough depth to ride out one transcription burst without stalling the
    // stream reader.
    let (cmd_tx, cmd_rx) = mpsc::channel(64);

    let worker_config = config.clone();
    let handle = tokio::task::spawn_blocking(move || {
        run_pipeline_worker(
            pipeline,
            partial_service,
            transcription,
            worker_config,
            cmd_rx,
            outbound,
        );
    });

    SessionWorker {
        cmd_tx,
        handle,
        config,
    }
}

/// The blocking half of a session: VAD, transcription, partials.
fn run_pipeline_worker(
    mut pipeline: SttPipeline,
    partial_service: PartialTranscriptService,
    transcription: Arc<TranscriptionService>,
    config: SessionConfig,
    mut cmd_rx: mpsc::Receiver<WorkerCommand>,
    out: mpsc::Sender<SttServerMessage>,
) {
    let session = SpeechSession::new();

    while let Some(command) = cmd_rx.blocking_recv() {
        match command {
            WorkerCommand::Frame(audio) => {
                match pipeline.process_audio(&audio) {
                    Ok(events) => {
                        for event in events {
                            let message = match event {
                                PipelineEvent::SpeechStarted { timestamp_ms } => {
                                    session.start_speech();
                                    SttServerMessage::SpeechStarted { timestamp_ms }
                                }
                                PipelineEvent::SpeechStopped { timestamp_ms } => {
                                    // The closed utterance was transcribed from the
                                    // VAD segment; dropping the session copy keeps
                                    // the end-of-stream flush from re-reading it.
                                    session.stop_speech();
                                    session.clear_buffer();
                                    SttServerMessage::SpeechStopped { timestamp_ms }
                                }
                                PipelineEvent::Transcript(t) => SttServerMessage::Transcript(t),
                            };
                            if out.blocking_send(message).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(target: "stt", "pipeline error: {}", e);
                        pipeline.reset();
                        session.stop_speech();
                        if out
                            .blocking_send(SttServerMessage::Error {
                                message: e.to_string(),
                                code: Some("transcription_error".into()),
                            })
                            .is_err()
                        {
                            return;
                        }
                        continue;
                    }
                }

                if session.is_active() {
                    session.append_audio(&audio);
                    if config.partials {
                        match partial_service.generate_partial(&session, &config) {
                            Ok(Some(partial)) => {
                                if out
                                    .blocking_send(SttServerMessage::Transcript(partial))
                                    .is_err()
                                {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                if out
                                    .blocking_send(SttServerMessage::Error {
                                        message: e.to_string(),
                                        code: Some("transcription_error".into()),
                                    })
                                    .is_err()
                                {
                                    return;
                                }
                            }
                        }
                    }
                }
            }

            WorkerCommand::Encoded { data, format } => {
                let result = transcription.transcribe_encoded(
                    &data,
                    format.as_deref(),
                    Some(&config.language),
                    config.include_word_timestamps,
                    config.model_id.as_deref(),
                );
                let message = match result {
                    Ok(transcript) => SttServerMessage::Transcript(transcript),
                    Err(e) => SttServerMessage::Error {
                        message: e.to_string(),
                        code: Some("transcription_error".into()),
                    },
                };
                if out.blocking_send(message).is_err() {
                    return;
                }
            }

            WorkerCommand::Flush => {
                flush_remaining(&mut pipeline, &partial_service, &session, &out);
                pipeline.reset();
                return;
            }
        }
    }
}

/// Transcribe whatever session audio is left at stream end, gated on the
/// minimum audio duration so sub-utterance tails do not produce junk.
fn flush_remaining(
    pipeline: &mut SttPipeline,
    partial_service: &PartialTranscriptService,
    session: &SpeechSession,
    out: &mpsc::Sender<SttServerMessage>,
) {
    let Some(audio) = partial_service.flush_remaining_audio(session) else {
        return;
    };
    let duration_ms = samples_to_ms(audio.len());
    if duration_ms < pipeline.vad_config().min_audio_duration_ms as u64 {
        debug!(
            target: "stt",
            "skipping end-of-stream flush: only {}ms buffered", duration_ms
        );
        return;
    }

    match pipeline.transcribe_flush(&audio) {
        Ok(Some(transcript)) => {
            let _ = out.blocking_send(SttServerMessage::Transcript(transcript));
        }
        Ok(None) => {}
        Err(e) => {
            let _ = out.blocking_send(SttServerMessage::Error {
                message: e.to_string(),
                code: Some("transcription_error".into()),
            });
        }
    }
}
