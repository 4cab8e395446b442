//! End-to-end TTS session tests with a deterministic tone engine.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;

use sotto_engine::{Device, EngineLifecycle, EngineManager, EngineManagerConfig};
use sotto_foundation::EngineError;
use sotto_server::{run_tts_session, TtsClientMessage, TtsServerMessage, TtsSessionConfig, TtsSessionDeps};
use sotto_tts::engine::PcmChunkIter;
use sotto_tts::{SynthesisConfig, SynthesisError, Synthesizer, TtsEngine};

/// Yields one 100 ms sine chunk (2400 samples at 24 kHz) per 12 characters
/// of input text.
struct SineEngine;

impl EngineLifecycle for SineEngine {
    fn load(&self) -> Result<(), EngineError> {
        Ok(())
    }
    fn unload(&self) -> Result<(), EngineError> {
        Ok(())
    }
    fn is_loaded(&self) -> bool {
        true
    }
}

impl TtsEngine for SineEngine {
    fn synthesize_stream(
        &self,
        text: &str,
        _voice_id: &str,
        _speed: f32,
        _cancel: Arc<AtomicBool>,
    ) -> Result<PcmChunkIter, SynthesisError> {
        let n_chunks = text.chars().count() / 12 + 1;
        let chunks: Vec<Result<Vec<f32>, SynthesisError>> = (0..n_chunks)
            .map(|c| {
                Ok((0..2_400)
                    .map(|i| {
                        let t = (c * 2_400 + i) as f32;
                        (2.0 * std::f32::consts::PI * 440.0 * t / 24_000.0).sin() * 0.4
                    })
                    .collect())
            })
            .collect();
        Ok(Box::new(chunks.into_iter()))
    }
}

fn deps() -> TtsSessionDeps {
    let manager = EngineManager::<dyn TtsEngine>::new(
        EngineManagerConfig {
            engine_id: "sine".into(),
            device: Device::Cpu,
            ttl_secs: 0,
            fallback_engines: Vec::new(),
        },
        Box::new(|_, _| Ok(Arc::new(SineEngine) as Arc<dyn TtsEngine>)),
    );
    TtsSessionDeps {
        synthesizer: Arc::new(Synthesizer::new(manager, SynthesisConfig::default())),
    }
}

fn config(format: &str) -> TtsClientMessage {
    TtsClientMessage::Config(TtsSessionConfig {
        voice_id: "af_heart".into(),
        sample_rate: None,
        speed: None,
        response_format: Some(format.into()),
    })
}

async fn drive(messages: Vec<TtsClientMessage>) -> Vec<TtsServerMessage> {
    let (tx, mut rx) = mpsc::channel(4096);
    run_tts_session(futures::stream::iter(messages), tx, deps()).await;

    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn audio_payloads(out: &[TtsServerMessage]) -> Vec<&TtsServerMessage> {
    out.iter()
        .filter(|m| matches!(m, TtsServerMessage::Audio { .. }))
        .collect()
}

fn done_of(out: &[TtsServerMessage]) -> Option<(u64, u64, usize, String)> {
    out.iter().find_map(|m| match m {
        TtsServerMessage::Done {
            audio_duration_ms,
            processing_duration_ms,
            text_length,
            transcript,
            ..
        } => Some((
            *audio_duration_ms,
            *processing_duration_ms,
            *text_length,
            transcript.clone(),
        )),
        _ => None,
    })
}

#[tokio::test]
async fn no_config_yields_single_error() {
    let out = drive(vec![TtsClientMessage::End]).await;
    assert_eq!(out.len(), 1);
    assert!(matches!(out[0], TtsServerMessage::Error { code: 1, .. }));
}

#[tokio::test]
async fn empty_text_is_code_four_with_no_audio_or_done() {
    let out = drive(vec![
        config("pcm"),
        TtsClientMessage::Text { text: "   ".into() },
        TtsClientMessage::End,
    ])
    .await;

    assert!(matches!(out[0], TtsServerMessage::Ready { .. }));
    let errors: Vec<_> = out
        .iter()
        .filter(|m| matches!(m, TtsServerMessage::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], TtsServerMessage::Error { code: 4, .. }));
    assert!(audio_payloads(&out).is_empty());
    assert!(done_of(&out).is_none());
}

#[tokio::test]
async fn unknown_format_is_code_seven() {
    let out = drive(vec![
        config("ogg"),
        TtsClientMessage::Text {
            text: "Hello.".into(),
        },
        TtsClientMessage::End,
    ])
    .await;
    assert!(out
        .iter()
        .any(|m| matches!(m, TtsServerMessage::Error { code: 7, .. })));
    assert!(done_of(&out).is_none());
}

#[tokio::test]
async fn duplicate_config_reports_after_ready() {
    let out = drive(vec![
        config("pcm"),
        config("pcm"),
        TtsClientMessage::Text {
            text: "Hello world.".into(),
        },
        TtsClientMessage::End,
    ])
    .await;
    assert!(matches!(out[0], TtsServerMessage::Ready { .. }));
    assert!(matches!(out[1], TtsServerMessage::Error { code: 1, .. }));
    assert!(done_of(&out).is_some());
}

#[tokio::test]
async fn pcm_bytes_match_reported_duration() {
    let out = drive(vec![
        config("pcm"),
        TtsClientMessage::Text {
            text: "Hello world.".into(),
        },
        TtsClientMessage::End,
    ])
    .await;

    let total_bytes: usize = out
        .iter()
        .filter_map(|m| match m {
            TtsServerMessage::Audio { data, format, .. } if format == "pcm" => Some(data.len()),
            _ => None,
        })
        .sum();
    let (audio_ms, _, text_length, transcript) = done_of(&out).expect("done missing");

    assert_eq!(transcript, "Hello world.");
    assert_eq!(text_length, 12);
    // PCM16 at 24kHz mono: bytes = ms * 24 * 2, within one 100ms chunk.
    let expected = audio_ms as usize * 24 * 2;
    assert!(
        (total_bytes as i64 - expected as i64).abs() <= 4_800,
        "bytes {} vs expected {}",
        total_bytes,
        expected
    );
}

#[tokio::test]
async fn opus_frames_decode_to_960_samples_each() {
    use audiopus::coder::Decoder;
    use audiopus::{Channels, SampleRate};

    let out = drive(vec![
        config("opus"),
        TtsClientMessage::Text {
            text: "A longer sentence so several opus frames come out.".into(),
        },
        TtsClientMessage::End,
    ])
    .await;

    let mut decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono).unwrap();
    let mut decoded_total = 0usize;
    let mut frames = 0usize;
    for msg in &out {
        if let TtsServerMessage::Audio {
            data,
            format,
            sample_rate,
            ..
        } = msg
        {
            assert_eq!(format, "opus");
            assert_eq!(*sample_rate, 48_000);
            let mut buf = vec![0i16; 5_760];
            let pkt = audiopus::packet::Packet::try_from(data.as_slice()).unwrap();
            let signals = audiopus::MutSignals::try_from(&mut buf).unwrap();
            let n = decoder.decode(Some(pkt), signals, false).unwrap();
            assert_eq!(n, 960, "every opus frame is one 20ms packet");
            decoded_total += n;
            frames += 1;
        }
    }
    assert!(frames >= 10, "expected a stream of frames, got {}", frames);

    let (audio_ms, _, _, _) = done_of(&out).expect("done missing");
    let expected_samples = audio_ms as usize * 48;
    assert!(
        (decoded_total as i64 - expected_samples as i64).abs() <= 2 * 960,
        "decoded {} vs expected {}",
        decoded_total,
        expected_samples
    );
}

#[tokio::test]
async fn wav_is_a_single_buffered_payload() {
    let out = drive(vec![
        config("wav"),
        TtsClientMessage::Text {
            text: "Hello world.".into(),
        },
        TtsClientMessage::End,
    ])
    .await;

    let audio = audio_payloads(&out);
    assert_eq!(audio.len(), 1, "buffered wav arrives as one message");
    let TtsServerMessage::Audio {
        data,
        format,
        transcript,
        ..
    } = audio[0]
    else {
        unreachable!();
    };
    assert_eq!(format, "wav");
    assert_eq!(&data[0..4], b"RIFF");
    assert_eq!(transcript.as_deref(), Some("Hello world."));
    assert!(done_of(&out).is_some());
}

#[tokio::test]
async fn mp3_streams_and_reports_done() {
    let out = drive(vec![
        config("mp3"),
        TtsClientMessage::Text {
            text: "A sentence long enough for a few mp3 frames to appear in the stream."
                .into(),
        },
        TtsClientMessage::End,
    ])
    .await;

    let mp3_bytes: usize = out
        .iter()
        .filter_map(|m| match m {
            TtsServerMessage::Audio { data, format, .. } if format == "mp3" => Some(data.len()),
            _ => None,
        })
        .sum();
    assert!(mp3_bytes > 1_000, "mp3 stream too small: {}", mp3_bytes);

    let (audio_ms, _, _, _) = done_of(&out).expect("done missing");
    assert!(audio_ms >= 500);
}
