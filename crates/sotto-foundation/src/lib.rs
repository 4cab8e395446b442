//! Foundation types for the sotto speech sidecar.
//!
//! This crate holds the error taxonomy shared by every other crate in the
//! workspace. Each subsystem has its own error enum; `SottoError` is the
//! umbrella used at the session boundary.

pub mod error;

pub use error::{
    AudioError, EngineError, SessionError, SottoError, SttError, VadError,
};
