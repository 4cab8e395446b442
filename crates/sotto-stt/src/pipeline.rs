//! Per-session STT orchestration.
//!
//! Ties the VAD state machine, the transcription service, and the EOU
//! scorer together. Events come out in causal order: `SpeechStarted` before
//! any transcript for that utterance, the final transcript after
//! `SpeechStopped`.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use sotto_foundation::SttError;
use sotto_vad::{SpeechSegment, VadConfig, VadEvent, VadModel, VadProcessor};

use crate::eou::{ConversationTurn, EouConfig, EouModel};
use crate::transcription::TranscriptionService;
use crate::types::{SessionConfig, Transcript};

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SpeechStarted { timestamp_ms: u64 },
    SpeechStopped { timestamp_ms: u64 },
    Transcript(Transcript),
}

#[derive(Debug, Clone, Default)]
pub struct SttPipelineConfig {
    pub vad: VadConfig,
    pub eou: EouConfig,
}

pub struct SttPipeline {
    transcription: Arc<TranscriptionService>,
    vad: VadProcessor,
    eou_model: Arc<dyn EouModel>,
    config: SttPipelineConfig,
    session_config: SessionConfig,
    conversation_history: Vec<ConversationTurn>,
    pending_user_text: String,
}

impl SttPipeline {
    pub fn new(
        transcription: Arc<TranscriptionService>,
        vad_model: Arc<dyn VadModel>,
        eou_model: Arc<dyn EouModel>,
        config: SttPipelineConfig,
        session_config: SessionConfig,
    ) -> Self {
        let vad = VadProcessor::new(config.vad.clone(), vad_model);
        Self {
            transcription,
            vad,
            eou_model,
            config,
            session_config,
            conversation_history: Vec::new(),
            pending_user_text: String::new(),
        }
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    pub fn vad_config(&self) -> &VadConfig {
        self.vad.config()
    }

    pub fn conversation_history(&self) -> &[ConversationTurn] {
        &self.conversation_history
    }

    /// Feed one frame of canonical audio; returns the events it produced,
    /// in order.
    pub fn process_audio(&mut self, audio: &[f32]) -> Result<Vec<PipelineEvent>, SttError> {
        let (event, segment) = self.vad.append(audio)?;

        let mut events = Vec::new();
        match event {
            Some(VadEvent::SpeechStarted { timestamp_ms }) => {
                events.push(PipelineEvent::SpeechStarted { timestamp_ms });
            }
            Some(VadEvent::SpeechStopped { timestamp_ms }) => {
                events.push(PipelineEvent::SpeechStopped { timestamp_ms });

                if let Some(segment) = segment {
                    if !segment.samples.is_empty() {
                        let mut transcript = self.transcribe_segment(&segment)?;
                        transcript.text = transcript.text.trim().to_string();
                        if !transcript.text.is_empty() {
                            self.attach_eou_probability(&mut transcript)?;
                            events.push(PipelineEvent::Transcript(transcript));
                        }
                    }
                }
            }
            None => {}
        }

        Ok(events)
    }

    /// Transcribe remaining audio at stream end as one final segment.
    pub fn transcribe_flush(&mut self, audio: &[f32]) -> Result<Option<Transcript>, SttError> {
        let start = Instant::now();
        let mut transcript = self.transcription.transcribe(
            audio,
            Some(&self.session_config.language),
            self.session_config.include_word_timestamps,
            self.session_config.model_id.as_deref(),
        )?;
        transcript.text = transcript.text.trim().to_string();
        if transcript.text.is_empty() {
            return Ok(None);
        }
        if transcript.processing_duration_ms == 0 {
            transcript.processing_duration_ms = start.elapsed().as_millis() as u64;
        }
        self.attach_eou_probability(&mut transcript)?;
        Ok(Some(transcript))
    }

    /// Record an assistant reply into the conversation context.
    pub fn add_assistant_turn(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.conversation_history
            .push(ConversationTurn::assistant(trimmed));
        self.trim_history();
    }

    /// Reset per-utterance state; the conversation context survives.
    pub fn reset(&mut self) {
        self.vad.reset();
        self.pending_user_text.clear();
    }

    fn transcribe_segment(&self, segment: &SpeechSegment) -> Result<Transcript, SttError> {
        let mut transcript = self.transcription.transcribe(
            &segment.samples,
            Some(&self.session_config.language),
            self.session_config.include_word_timestamps,
            self.session_config.model_id.as_deref(),
        )?;
        transcript.start_ms = segment.start_ms;
        transcript.end_ms = segment.end_ms;
        Ok(transcript)
    }

    /// Score the pending user turn and commit it to history on a confident
    /// end-of-utterance.
    fn attach_eou_probability(&mut self, transcript: &mut Transcript) -> Result<(), SttError> {
        if self.pending_user_text.is_empty() {
            self.pending_user_text = transcript.text.clone();
        } else {
            self.pending_user_text = format!("{} {}", self.pending_user_text, transcript.text);
        }

        let mut provisional = self.conversation_history.clone();
        provisional.push(ConversationTurn::user(self.pending_user_text.clone()));

        let probability = self.eou_model.predict(&provisional)?;
        transcript.eou_probability = Some(probability);

        if probability >= self.config.eou.threshold {
            self.conversation_history
                .push(ConversationTurn::user(std::mem::take(
                    &mut self.pending_user_text,
                )));
            self.trim_history();
        }

        debug!(
            target: "stt",
            "EOU probability {:.3} for: {:.50}", probability, transcript.text
        );
        Ok(())
    }

    fn trim_history(&mut self) {
        let max = self.config.eou.max_context_turns * 2;
        if self.conversation_history.len() > max {
            let excess = self.conversation_history.len() - max;
            self.conversation_history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SttEngine;
    use crate::eou::Role;
    use sotto_engine::{Device, EngineLifecycle, EngineManager, EngineManagerConfig};
    use sotto_foundation::EngineError;
    use sotto_vad::EnergyVad;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoEngine {
        calls: Arc<AtomicUsize>,
        texts: Vec<&'static str>,
    }

    impl EngineLifecycle for EchoEngine {
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

    impl SttEngine for EchoEngine {
        fn transcribe(
            &self,
            audio: &[f32],
            _language: Option<&str>,
            _word_timestamps: bool,
        ) -> Result<Transcript, SttError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self.texts.get(call).copied().unwrap_or("more speech");
            Ok(Transcript {
                text: text.to_string(),
                audio_duration_ms: (audio.len() as u64 * 1000) / 16_000,
                model: Some("echo".into()),
                ..Transcript::default()
            })
        }
    }

    /// Fixed-probability EOU scorer.
    struct FixedEou(f32);

    impl EouModel for FixedEou {
        fn predict(&self, _turns: &[ConversationTurn]) -> Result<f32, SttError> {
            Ok(self.0)
        }
    }

    fn pipeline_with(texts: Vec<&'static str>, eou_p: f32) -> SttPipeline {
        let manager = EngineManager::<dyn SttEngine>::new(
            EngineManagerConfig {
                engine_id: "echo".into(),
                device: Device::Cpu,
                ttl_secs: 0,
                fallback_engines: Vec::new(),
            },
            Box::new(move |_, _| {
                Ok(Arc::new(EchoEngine {
                    calls: Arc::new(AtomicUsize::new(0)),
                    texts: texts.clone(),
                }) as Arc<dyn SttEngine>)
            }),
        );
        SttPipeline::new(
            TranscriptionService::new(manager),
            Arc::new(EnergyVad::new()),
            Arc::new(FixedEou(eou_p)),
            SttPipelineConfig::default(),
            SessionConfig::default(),
        )
    }

    fn sine_ms(ms: usize) -> Vec<f32> {
        (0..ms * 16)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.3)
            .collect()
    }

    fn run_utterance(pipeline: &mut SttPipeline) -> Vec<PipelineEvent> {
        let mut audio = vec![0.0f32; 1_500 * 16];
        audio.extend(sine_ms(1_500));
        audio.extend(vec![0.0f32; 2_000 * 16]);

        let mut events = Vec::new();
        for frame in audio.chunks(20 * 16) {
            events.extend(pipeline.process_audio(frame).unwrap());
        }
        events
    }

    #[test]
    fn utterance_emits_started_stopped_final_in_order() {
        let mut pipeline = pipeline_with(vec!["hello there"], 0.9);
        let events = run_utterance(&mut pipeline);

        assert!(matches!(
            events[0],
            PipelineEvent::SpeechStarted { .. }
        ));
        assert!(matches!(
            events[1],
            PipelineEvent::SpeechStopped { .. }
        ));
        let PipelineEvent::Transcript(t) = &events[2] else {
            panic!("expected final transcript, got {:?}", events.get(2));
        };
        assert_eq!(t.text, "hello there");
        assert!(!t.is_partial);
        assert!(t.eou_probability.is_some());
        assert!(t.end_ms > t.start_ms);
    }

    #[test]
    fn confident_eou_commits_exactly_one_user_turn() {
        let mut pipeline = pipeline_with(vec!["first utterance"], 0.9);
        run_utterance(&mut pipeline);
        let history = pipeline.conversation_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "first utterance");
    }

    #[test]
    fn hesitant_eou_accumulates_pending_text() {
        let mut pipeline = pipeline_with(vec!["i was", "thinking about it"], 0.1);
        run_utterance(&mut pipeline);
        assert!(pipeline.conversation_history().is_empty());

        // Second utterance: still below threshold, nothing commits, but the
        // pending text grew.
        run_utterance(&mut pipeline);
        assert!(pipeline.conversation_history().is_empty());
        assert_eq!(pipeline.pending_user_text, "i was thinking about it");
    }

    #[test]
    fn assistant_turns_enter_history_trimmed() {
        let mut pipeline = pipeline_with(vec![], 0.9);
        pipeline.add_assistant_turn("  sure, go ahead  ");
        pipeline.add_assistant_turn("   ");
        let history = pipeline.conversation_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].content, "sure, go ahead");
    }

    #[test]
    fn history_is_clipped_to_twice_max_turns() {
        let mut pipeline = pipeline_with(vec![], 0.9);
        for i in 0..20 {
            pipeline.add_assistant_turn(&format!("reply {}", i));
        }
        assert_eq!(pipeline.conversation_history().len(), 8);
        assert_eq!(pipeline.conversation_history()[7].content, "reply 19");
    }

    #[test]
    fn flush_gates_empty_text() {
        let mut pipeline = pipeline_with(vec!["   "], 0.9);
        let result = pipeline.transcribe_flush(&sine_ms(500)).unwrap();
        assert!(result.is_none());
    }
}
