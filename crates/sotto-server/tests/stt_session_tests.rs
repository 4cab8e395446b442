//! End-to-end STT session tests driven through the handler interface with
//! fake model collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use sotto_engine::{Device, EngineLifecycle, EngineManager, EngineManagerConfig};
use sotto_foundation::{EngineError, SttError};
use sotto_server::{run_stt_session, SttClientMessage, SttSessionDeps, SttServerMessage};
use sotto_stt::{
    ConversationTurn, EouModel, SessionConfig, SttEngine, SttPipelineConfig, Transcript,
    TranscriptionService,
};
use sotto_vad::EnergyVad;

const MS: usize = 16;

/// Engine that returns ever-longer prefixes of a fixed word list, one step
/// per call.
struct GrowingEngine {
    calls: Arc<AtomicUsize>,
}

const WORDS: &[&str] = &["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

impl EngineLifecycle for GrowingEngine {
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

impl SttEngine for GrowingEngine {
    fn transcribe(
        &self,
        audio: &[f32],
        _language: Option<&str>,
        _word_timestamps: bool,
    ) -> Result<Transcript, SttError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let n = (call + 1).min(WORDS.len());
        Ok(Transcript {
            text: WORDS[..n].join(" "),
            audio_duration_ms: (audio.len() as u64 * 1000) / 16_000,
            model: Some("growing".into()),
            ..Transcript::default()
        })
    }
}

struct FixedEou(f32);

impl EouModel for FixedEou {
    fn predict(&self, _turns: &[ConversationTurn]) -> Result<f32, SttError> {
        Ok(self.0)
    }
}

fn deps() -> SttSessionDeps {
    let calls = Arc::new(AtomicUsize::new(0));
    let manager = EngineManager::<dyn SttEngine>::new(
        EngineManagerConfig {
            engine_id: "growing".into(),
            device: Device::Cpu,
            ttl_secs: 0,
            fallback_engines: Vec::new(),
        },
        Box::new(move |_, _| {
            Ok(Arc::new(GrowingEngine {
                calls: Arc::clone(&calls),
            }) as Arc<dyn SttEngine>)
        }),
    );
    SttSessionDeps {
        transcription: TranscriptionService::new(manager),
        vad_model: Arc::new(EnergyVad::new()),
        eou_model: Arc::new(FixedEou(0.8)),
        pipeline_config: SttPipelineConfig::default(),
    }
}

fn sine_ms(ms: usize) -> Vec<f32> {
    (0..ms * MS)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.3)
        .collect()
}

fn pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| (((s.clamp(-1.0, 1.0)) * 32767.0) as i16).to_le_bytes())
        .collect()
}

fn audio_frames(audio: &[f32]) -> Vec<SttClientMessage> {
    audio
        .chunks(20 * MS)
        .map(|frame| SttClientMessage::Audio {
            pcm16: pcm16(frame),
            sample_rate: Some(16_000),
        })
        .collect()
}

async fn drive(messages: Vec<SttClientMessage>, deps: SttSessionDeps) -> Vec<SttServerMessage> {
    let (tx, mut rx) = mpsc::channel(1024);
    let inbound = futures::stream::iter(messages);
    run_stt_session(inbound, tx, deps).await;

    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn is_error(msg: &SttServerMessage, needle: &str) -> bool {
    matches!(msg, SttServerMessage::Error { message, .. } if message.contains(needle))
}

#[tokio::test]
async fn audio_before_config_is_rejected_per_message() {
    let messages = vec![
        SttClientMessage::Audio {
            pcm16: pcm16(&sine_ms(20)),
            sample_rate: Some(16_000),
        },
        SttClientMessage::EndOfStream,
    ];
    let out = drive(messages, deps()).await;
    assert_eq!(out.len(), 1);
    assert!(is_error(&out[0], "not configured"));
}

#[tokio::test]
async fn duplicate_config_errors_but_stream_continues() {
    let messages = vec![
        SttClientMessage::Config(SessionConfig::default()),
        SttClientMessage::Config(SessionConfig::default()),
        SttClientMessage::EndOfStream,
    ];
    let out = drive(messages, deps()).await;
    assert!(matches!(out[0], SttServerMessage::Ready));
    assert!(is_error(&out[1], "already configured"));
}

#[tokio::test]
async fn utterance_produces_ordered_events_and_one_final() {
    let mut audio = vec![0.0f32; 2_000 * MS];
    audio.extend(sine_ms(1_500));
    audio.extend(vec![0.0f32; 2_000 * MS]);

    let mut messages = vec![SttClientMessage::Config(SessionConfig::default())];
    messages.extend(audio_frames(&audio));
    messages.push(SttClientMessage::EndOfStream);

    let out = drive(messages, deps()).await;

    assert!(matches!(out[0], SttServerMessage::Ready));
    let started = out
        .iter()
        .position(|m| matches!(m, SttServerMessage::SpeechStarted { .. }))
        .expect("no SpeechStarted");
    let stopped = out
        .iter()
        .position(|m| matches!(m, SttServerMessage::SpeechStopped { .. }))
        .expect("no SpeechStopped");
    let finals: Vec<&Transcript> = out
        .iter()
        .filter_map(|m| match m {
            SttServerMessage::Transcript(t) if !t.is_partial => Some(t),
            _ => None,
        })
        .collect();

    assert!(started < stopped);
    assert_eq!(finals.len(), 1, "expected exactly one final transcript");
    let final_t = finals[0];
    assert_eq!(final_t.text, "alpha");
    assert!(final_t.eou_probability.is_some());
    assert!(final_t.end_ms > final_t.start_ms);
}

#[tokio::test]
async fn stream_end_mid_utterance_flushes_remaining_audio() {
    // Speech is still running when the client hangs up: no SpeechStopped,
    // but the buffered tail is transcribed on the way out.
    let mut audio = vec![0.0f32; 1_500 * MS];
    audio.extend(sine_ms(1_200));

    let mut messages = vec![SttClientMessage::Config(SessionConfig::default())];
    messages.extend(audio_frames(&audio));

    let out = drive(messages, deps()).await;

    assert!(out
        .iter()
        .any(|m| matches!(m, SttServerMessage::SpeechStarted { .. })));
    assert!(!out
        .iter()
        .any(|m| matches!(m, SttServerMessage::SpeechStopped { .. })));
    let finals = out
        .iter()
        .filter(|m| matches!(m, SttServerMessage::Transcript(t) if !t.is_partial))
        .count();
    assert_eq!(finals, 1, "flush should produce one final transcript");
}

#[tokio::test]
async fn partials_are_monotone_prefixes_of_the_final() {
    let config = SessionConfig {
        partials: true,
        partial_window_ms: 1_500,
        partial_stride_ms: 700,
        ..SessionConfig::default()
    };

    let mut audio = vec![0.0f32; 2_000 * MS];
    audio.extend(sine_ms(3_500));
    audio.extend(vec![0.0f32; 2_000 * MS]);

    let mut messages = vec![SttClientMessage::Config(config)];
    messages.extend(audio_frames(&audio));
    messages.push(SttClientMessage::EndOfStream);

    let out = drive(messages, deps()).await;

    let partials: Vec<String> = out
        .iter()
        .filter_map(|m| match m {
            SttServerMessage::Transcript(t) if t.is_partial => Some(t.text.clone()),
            _ => None,
        })
        .collect();
    let final_text = out
        .iter()
        .find_map(|m| match m {
            SttServerMessage::Transcript(t) if !t.is_partial => Some(t.text.clone()),
            _ => None,
        })
        .expect("final transcript missing");

    assert!(!partials.is_empty(), "expected at least one partial");
    for p in &partials {
        assert!(p.eq_ignore_ascii_case(p.trim()));
        assert!(!p.is_empty());
    }
    // Concatenated partials form a word-boundary prefix of the final text.
    let concat = partials.join(" ").to_lowercase();
    assert!(
        final_text.to_lowercase().starts_with(&concat),
        "partials {:?} do not prefix final {:?}",
        concat,
        final_text
    );
    // No EOU on partials.
    assert!(out.iter().all(|m| match m {
        SttServerMessage::Transcript(t) if t.is_partial => t.eou_probability.is_none(),
        _ => true,
    }));
}

#[tokio::test]
async fn encoded_audio_is_a_one_shot_batch() {
    // A 1s 8kHz WAV goes through the container decode + batch path.
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav_bytes: Vec<u8> = Vec::new();
    {
        let mut writer = hound::WavWriter::new(std::io::Cursor::new(&mut wav_bytes), spec).unwrap();
        for i in 0..8_000 {
            writer
                .write_sample(((i as f32 * 0.2).sin() * 10_000.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    let messages = vec![
        SttClientMessage::Config(SessionConfig::default()),
        SttClientMessage::EncodedAudio {
            data: wav_bytes,
            format: Some("wav".into()),
        },
        SttClientMessage::EndOfStream,
    ];
    let out = drive(messages, deps()).await;

    assert!(matches!(out[0], SttServerMessage::Ready));
    let transcript = out
        .iter()
        .find_map(|m| match m {
            SttServerMessage::Transcript(t) => Some(t),
            _ => None,
        })
        .expect("batch transcript missing");
    assert_eq!(transcript.text, "alpha");
    assert!(transcript.audio_duration_ms >= 900);
}

#[tokio::test]
async fn undecodable_blob_reports_decode_error_and_continues() {
    let messages = vec![
        SttClientMessage::Config(SessionConfig::default()),
        SttClientMessage::EncodedAudio {
            data: vec![0xAB; 64],
            format: None,
        },
        SttClientMessage::EndOfStream,
    ];
    let out = drive(messages, deps()).await;
    assert!(matches!(out[0], SttServerMessage::Ready));
    assert!(out
        .iter()
        .any(|m| matches!(m, SttServerMessage::Error { .. })));
}
