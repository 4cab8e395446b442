//! Per-stream mutable session state.

use parking_lot::Mutex;

use sotto_audio::{ms_to_samples, samples_to_ms, RingBuffer};

/// The session buffer retains twice the utterance cap: enough for partials
/// plus the end-of-stream flush.
pub const MAX_SESSION_BUFFER_MS: u64 = 30_000;

struct SessionState {
    active: bool,
    buffer: RingBuffer,
    confirmed_words: Vec<String>,
    last_partial_ms: u64,
}

/// Mutable per-RPC session state: the live audio buffer, the confirmed word
/// stream, and the partial cursor.
///
/// One lock guards everything; the single writer is the audio ingestion
/// path, and readers always receive copies.
pub struct SpeechSession {
    state: Mutex<SessionState>,
}

impl SpeechSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                active: false,
                buffer: RingBuffer::new(ms_to_samples(MAX_SESSION_BUFFER_MS)),
                confirmed_words: Vec::new(),
                last_partial_ms: 0,
            }),
        }
    }

    /// Mark the start of an utterance: clears the buffer, the confirmed
    /// words, and the partial cursor.
    pub fn start_speech(&self) {
        let mut state = self.state.lock();
        state.active = true;
        state.buffer.clear();
        state.confirmed_words.clear();
        state.last_partial_ms = 0;
    }

    pub fn stop_speech(&self) {
        self.state.lock().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Append audio; ignored while no utterance is open.
    pub fn append_audio(&self, audio: &[f32]) {
        let mut state = self.state.lock();
        if state.active {
            state.buffer.append(audio);
        }
    }

    pub fn buffer_audio(&self) -> Vec<f32> {
        self.state.lock().buffer.to_vec()
    }

    pub fn buffer_tail(&self, n_samples: usize) -> Vec<f32> {
        self.state.lock().buffer.tail(n_samples)
    }

    pub fn buffer_ms(&self) -> u64 {
        samples_to_ms(self.state.lock().buffer.len())
    }

    pub fn clear_buffer(&self) {
        self.state.lock().buffer.clear();
    }

    /// Snapshot of `(last_partial_ms, confirmed_words)`.
    pub fn partial_state(&self) -> (u64, Vec<String>) {
        let state = self.state.lock();
        (state.last_partial_ms, state.confirmed_words.clone())
    }

    pub fn update_partial(&self, new_partial_ms: u64, words: Vec<String>) {
        let mut state = self.state.lock();
        state.last_partial_ms = new_partial_ms;
        state.confirmed_words = words;
    }
}

impl Default for SpeechSession {
    fn default() -> Self {
        Self::new()
    }
}
