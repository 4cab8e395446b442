//! Streaming speech-to-text for sotto.
//!
//! The pipeline is VAD-gated: audio flows into the segmentation state
//! machine, closed segments go to the transcription service (with OOM
//! fallback through the engine pool), finals pick up an end-of-utterance
//! probability over the running conversation, and an optional partial
//! service emits stabilising word tails during the utterance.

pub mod engine;
pub mod eou;
pub mod partial;
pub mod pipeline;
pub mod session;
pub mod text;
pub mod transcription;
pub mod types;

pub use engine::SttEngine;
pub use eou::{ConversationTurn, EouConfig, EouModel, Role, MAX_HISTORY_TURNS};
pub use partial::{PartialTranscriptService, PARTIAL_OVERLAP_MS};
pub use pipeline::{PipelineEvent, SttPipeline, SttPipelineConfig};
pub use session::{SpeechSession, MAX_SESSION_BUFFER_MS};
pub use text::{deduplicate_words, merge_transcripts};
pub use transcription::TranscriptionService;
pub use types::{SegmentTiming, SessionConfig, Transcript, Usage, WordTiming};

pub use sotto_foundation::SttError;
