use thiserror::Error;

#[derive(Error, Debug)]
pub enum SottoError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Vad(#[from] VadError),

    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),

    #[error("Transient error, will retry: {0}")]
    Transient(String),
}

impl From<tokio::task::JoinError> for SottoError {
    fn from(err: tokio::task::JoinError) -> Self {
        SottoError::Transient(format!("Task join failed: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resample failed: {0}")]
    ResampleFailed(String),

    #[error("Opus decode failed: {0}")]
    OpusDecodeFailed(String),

    #[error("Invalid PCM payload: {0}")]
    InvalidPcm(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("VAD inference failed: {0}")]
    InferenceFailed(String),

    #[error("VAD model initialization failed: {0}")]
    ModelInitFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcription failed after {attempts} OOM retries: {last_error}")]
    OomRetriesExhausted { attempts: u32, last_error: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("VAD error: {0}")]
    Vad(#[from] VadError),

    #[error("EOU scoring failed: {0}")]
    EouFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine load failed: {engine_id}: {reason}")]
    LoadFailed { engine_id: String, reason: String },

    #[error("Engine unload failed: {engine_id}: {reason}")]
    UnloadFailed { engine_id: String, reason: String },

    #[error("Engine operation failed: {0}")]
    OperationFailed(String),

    #[error("All engines failed to load: {0}")]
    AllEnginesFailed(String),
}

/// Client-protocol errors. Reported to the client as error messages; the
/// stream continues.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not configured")]
    NotConfigured,

    #[error("Session already configured")]
    AlreadyConfigured,
}
