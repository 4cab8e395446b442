//! Engine lifecycle management.
//!
//! Model instances are heavyweight: loading takes seconds and memory is the
//! scarce resource. This crate provides the refcounted wrapper
//! ([`ManagedEngine`]) and the keyed pool ([`EngineManager`]) that STT and
//! TTS share, including the OOM-triggered fallback chain
//! (alternate engine, then a one-shot CPU device transition).

pub mod managed;
pub mod manager;
pub mod oom;

pub use managed::{EngineGuard, EngineLifecycle, ManagedEngine};
pub use manager::{Device, EngineManager, EngineManagerConfig};
pub use oom::{is_oom_error, MAX_OOM_RETRIES};

pub use sotto_foundation::EngineError;
