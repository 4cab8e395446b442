use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sotto_foundation::EngineError;

use crate::managed::{EngineLifecycle, ManagedEngine};

/// Inference device preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineManagerConfig {
    /// Default engine id used when a session does not request one.
    pub engine_id: String,
    pub device: Device,
    /// Idle seconds before an unused engine unloads; 0 keeps engines
    /// resident.
    pub ttl_secs: u64,
    /// Alternate engine ids tried when the default keeps hitting OOM.
    pub fallback_engines: Vec<String>,
}

impl Default for EngineManagerConfig {
    fn default() -> Self {
        Self {
            engine_id: String::new(),
            device: Device::Cuda,
            ttl_secs: 300,
            fallback_engines: Vec::new(),
        }
    }
}

/// Builds an engine instance for `(engine_id, device)`.
pub type EngineFactory<T> =
    Box<dyn Fn(&str, Device) -> Result<Arc<T>, EngineError> + Send + Sync>;

struct ManagerState<T: EngineLifecycle + ?Sized + 'static> {
    engines: HashMap<String, Arc<ManagedEngine<T>>>,
    current_device: Device,
    tried_cpu_fallback: bool,
    failed_engines: HashSet<String>,
}

/// Keyed pool of managed engines with OOM fallback.
///
/// Lock discipline: the manager lock only guards the map and device state
/// and is never held across wrapper operations (acquire/unload), so engine
/// loading serialises on the wrapper lock alone.
pub struct EngineManager<T: EngineLifecycle + ?Sized + 'static> {
    config: EngineManagerConfig,
    factory: EngineFactory<T>,
    state: Mutex<ManagerState<T>>,
}

impl<T: EngineLifecycle + ?Sized + 'static> EngineManager<T> {
    pub fn new(config: EngineManagerConfig, factory: EngineFactory<T>) -> Arc<Self> {
        let device = config.device;
        Arc::new(Self {
            config,
            factory,
            state: Mutex::new(ManagerState {
                engines: HashMap::new(),
                current_device: device,
                tried_cpu_fallback: false,
                failed_engines: HashSet::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineManagerConfig {
        &self.config
    }

    pub fn current_device(&self) -> Device {
        self.state.lock().current_device
    }

    pub fn failed_engines(&self) -> HashSet<String> {
        self.state.lock().failed_engines.clone()
    }

    /// Resolve which engine a fresh acquisition should use: the requested id
    /// if it has not failed, else the default, else the first healthy
    /// fallback. When everything has failed the default is returned anyway
    /// and the load error surfaces to the caller.
    fn select_engine_id(&self, requested: Option<&str>) -> String {
        let state = self.state.lock();
        let mut candidates: Vec<&str> = Vec::new();
        if let Some(id) = requested {
            candidates.push(id);
        }
        candidates.push(&self.config.engine_id);
        for id in &self.config.fallback_engines {
            candidates.push(id);
        }
        for id in &candidates {
            if !state.failed_engines.contains(*id) {
                return (*id).to_string();
            }
        }
        self.config.engine_id.clone()
    }

    /// Return the wrapper for an engine id, creating the map entry if
    /// absent. `None` picks the healthiest of default + fallbacks.
    pub fn get(self: &Arc<Self>, engine_id: Option<&str>) -> Arc<ManagedEngine<T>> {
        let engine_id = self.select_engine_id(engine_id);
        let mut state = self.state.lock();
        if let Some(wrapper) = state.engines.get(&engine_id) {
            return Arc::clone(wrapper);
        }

        let id_for_create = engine_id.clone();
        let factory_handle: Weak<Self> = Arc::downgrade(self);
        let create_fn = Box::new(move || {
            let manager = factory_handle
                .upgrade()
                .ok_or_else(|| EngineError::OperationFailed("engine manager dropped".into()))?;
            let device = manager.current_device();
            (manager.factory)(&id_for_create, device)
        });

        let removed_handle: Weak<Self> = Arc::downgrade(self);
        let removed_cb = Box::new(move |id: &str| {
            if let Some(manager) = removed_handle.upgrade() {
                manager.state.lock().engines.remove(id);
            }
        });

        let wrapper = ManagedEngine::new(
            engine_id.clone(),
            create_fn,
            Duration::from_secs(self.config.ttl_secs),
            Some(removed_cb),
        );
        state.engines.insert(engine_id, Arc::clone(&wrapper));
        wrapper
    }

    /// Warm the cache for an engine id.
    pub fn preload(self: &Arc<Self>, engine_id: Option<&str>) -> Result<(), EngineError> {
        self.get(engine_id).preload()
    }

    /// Handle an OOM on the current engine: mark it failed and unload it.
    /// Returns true when the caller should retry (another model remains, or
    /// the one-shot CPU transition just happened); false when exhausted.
    pub fn try_fallback(self: &Arc<Self>) -> bool {
        let (to_unload, exhausted) = {
            let mut state = self.state.lock();
            let current = self.config.engine_id.clone();
            state.failed_engines.insert(current.clone());
            let wrapper = state.engines.remove(&current);
            let remaining = self
                .config
                .fallback_engines
                .iter()
                .any(|id| !state.failed_engines.contains(id));
            (wrapper, !remaining)
        };

        if let Some(wrapper) = to_unload {
            wrapper.force_unload();
        }

        if exhausted {
            self.attempt_cpu_fallback()
        } else {
            true
        }
    }

    /// One-shot device transition: clear every engine and retry everything
    /// on CPU. Returns false when already on CPU or already attempted.
    fn attempt_cpu_fallback(self: &Arc<Self>) -> bool {
        let drained = {
            let mut state = self.state.lock();
            if state.current_device == Device::Cpu || state.tried_cpu_fallback {
                return false;
            }
            warn!(target: "engine", "switching to CPU fallback after OOM");
            state.current_device = Device::Cpu;
            state.tried_cpu_fallback = true;
            state.failed_engines.clear();
            state.engines.drain().map(|(_, w)| w).collect::<Vec<_>>()
        };

        for wrapper in drained {
            wrapper.force_unload();
        }
        true
    }

    /// Administrative: drop one engine now, refcount or not.
    pub fn force_unload(self: &Arc<Self>, engine_id: Option<&str>) {
        let engine_id = engine_id.unwrap_or(&self.config.engine_id).to_string();
        let wrapper = self.state.lock().engines.remove(&engine_id);
        if let Some(wrapper) = wrapper {
            wrapper.force_unload();
        }
    }

    /// Administrative: unload everything and restore the configured device.
    pub fn reset_device_preference(self: &Arc<Self>) {
        let drained = {
            let mut state = self.state.lock();
            state.current_device = self.config.device;
            state.tried_cpu_fallback = false;
            state.failed_engines.clear();
            state.engines.drain().map(|(_, w)| w).collect::<Vec<_>>()
        };
        for wrapper in drained {
            wrapper.force_unload();
        }
        info!(
            target: "engine",
            "reset device preference to {}", self.config.device
        );
    }
}
