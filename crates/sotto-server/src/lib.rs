//! Per-stream session handlers.
//!
//! The RPC transport is an external collaborator: it adapts its wire
//! messages to the tagged unions in [`messages`] and drives
//! [`run_stt_session`] / [`run_tts_session`] with an inbound
//! `futures::Stream` and an outbound `tokio::sync::mpsc` sender. Handlers
//! never abort the stream on protocol mistakes; they report typed errors
//! and keep going until the client closes.

pub mod messages;
pub mod stt;
pub mod tts;

pub use messages::{
    SttClientMessage, SttServerMessage, TtsClientMessage, TtsServerMessage, TtsSessionConfig,
    TtsUsage,
};
pub use stt::{run_stt_session, SttSessionDeps};
pub use tts::{run_tts_session, TtsSessionDeps};
