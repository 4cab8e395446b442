use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use sotto_foundation::EngineError;

/// Lifecycle operations every managed engine exposes. Engines are shared
/// read-only after load, so all methods take `&self`; implementations keep
/// their mutable model state behind interior locks.
pub trait EngineLifecycle: Send + Sync {
    fn load(&self) -> Result<(), EngineError>;
    fn unload(&self) -> Result<(), EngineError>;
    fn is_loaded(&self) -> bool;
}

type CreateFn<T> = Box<dyn Fn() -> Result<Arc<T>, EngineError> + Send + Sync>;
type RemovedFn = Box<dyn Fn(&str) + Send + Sync>;

struct Slot<T: ?Sized> {
    engine: Option<Arc<T>>,
    ref_count: usize,
    /// Bumped on every acquire and unload; a pending expire timer only fires
    /// if its captured generation still matches.
    expire_generation: u64,
}

/// Scoped-acquisition wrapper around one engine instance.
///
/// The first `acquire` loads the engine under the wrapper lock; every
/// acquire increments a refcount that the returned guard decrements on all
/// exit paths (including unwind). When the count reaches zero and the TTL is
/// non-zero an unload timer is scheduled; a TTL of zero means keep resident.
pub struct ManagedEngine<T: EngineLifecycle + ?Sized> {
    engine_id: String,
    create_fn: CreateFn<T>,
    ttl: Duration,
    slot: Mutex<Slot<T>>,
    removed_callback: Option<RemovedFn>,
}

impl<T: EngineLifecycle + ?Sized + 'static> ManagedEngine<T> {
    pub fn new(
        engine_id: impl Into<String>,
        create_fn: CreateFn<T>,
        ttl: Duration,
        removed_callback: Option<RemovedFn>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine_id: engine_id.into(),
            create_fn,
            ttl,
            slot: Mutex::new(Slot {
                engine: None,
                ref_count: 0,
                expire_generation: 0,
            }),
            removed_callback,
        })
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().engine.is_some()
    }

    pub fn ref_count(&self) -> usize {
        self.slot.lock().ref_count
    }

    /// Load (if needed), bump the refcount, and cancel any pending unload.
    pub fn acquire(self: &Arc<Self>) -> Result<EngineGuard<T>, EngineError> {
        let mut slot = self.slot.lock();

        if slot.engine.is_none() {
            info!(target: "engine", "creating engine {}", self.engine_id);
            let start = Instant::now();
            let engine = (self.create_fn)()?;
            engine.load()?;
            info!(
                target: "engine",
                "engine {} ready in {:.2}s",
                self.engine_id,
                start.elapsed().as_secs_f32()
            );
            slot.engine = Some(engine);
        }

        slot.ref_count += 1;
        slot.expire_generation += 1;

        let engine = slot
            .engine
            .clone()
            .ok_or_else(|| EngineError::OperationFailed("engine slot empty after load".into()))?;

        Ok(EngineGuard {
            wrapper: Arc::clone(self),
            engine,
        })
    }

    fn release(self: &Arc<Self>) {
        let mut slot = self.slot.lock();
        slot.ref_count = slot.ref_count.saturating_sub(1);

        if slot.ref_count == 0 && !self.ttl.is_zero() && slot.engine.is_some() {
            slot.expire_generation += 1;
            let generation = slot.expire_generation;
            let ttl = self.ttl;
            let weak: Weak<Self> = Arc::downgrade(self);
            info!(
                target: "engine",
                "engine {} idle, unloading in {}s",
                self.engine_id,
                ttl.as_secs()
            );
            std::thread::spawn(move || {
                std::thread::sleep(ttl);
                if let Some(wrapper) = weak.upgrade() {
                    wrapper.expire(generation);
                }
            });
        }
    }

    fn expire(self: &Arc<Self>, generation: u64) {
        let fire = {
            let slot = self.slot.lock();
            slot.expire_generation == generation && slot.ref_count == 0 && slot.engine.is_some()
        };
        if fire {
            self.unload();
        }
    }

    /// Unload if idle. A no-op while the refcount is positive or the slot is
    /// already empty.
    pub fn unload(self: &Arc<Self>) {
        {
            let mut slot = self.slot.lock();
            if slot.engine.is_none() || slot.ref_count > 0 {
                return;
            }
            slot.expire_generation += 1;
            if let Some(engine) = slot.engine.take() {
                if let Err(e) = engine.unload() {
                    warn!(
                        target: "engine",
                        "engine {} unload failed: {}", self.engine_id, e
                    );
                }
            }
        }

        info!(target: "engine", "engine {} unloaded", self.engine_id);
        if let Some(cb) = &self.removed_callback {
            cb(&self.engine_id);
        }
    }

    /// Drop the instance regardless of refcount. Used by administrative
    /// resets and the device fallback transition.
    pub fn force_unload(self: &Arc<Self>) {
        {
            let mut slot = self.slot.lock();
            slot.ref_count = 0;
        }
        self.unload();
    }

    /// Warm the cache: acquire and immediately release, which loads the
    /// engine and arms the idle timer.
    pub fn preload(self: &Arc<Self>) -> Result<(), EngineError> {
        let guard = self.acquire()?;
        drop(guard);
        Ok(())
    }
}

/// Holds one engine acquisition; the refcount drops with the guard.
pub struct EngineGuard<T: EngineLifecycle + ?Sized + 'static> {
    wrapper: Arc<ManagedEngine<T>>,
    engine: Arc<T>,
}

impl<T: EngineLifecycle + ?Sized + 'static> Deref for EngineGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.engine
    }
}

impl<T: EngineLifecycle + ?Sized + 'static> Drop for EngineGuard<T> {
    fn drop(&mut self) {
        self.wrapper.release();
    }
}
