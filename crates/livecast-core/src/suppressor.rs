//! Scoped broadcast suppression.
//!
//! Suppression is a dynamic scope in which outbound broadcasts are
//! intentionally dropped, e.g. while seeding data in bulk. Two independent
//! axes exist: a global one, and a per-model one keyed by model name. A
//! broadcast is blocked when either axis is active.
//!
//! State is thread-local: rule evaluation runs synchronously inside the
//! caller's commit path, so a scope never needs to cross threads. Guards
//! are `!Send` to keep it that way.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::marker::PhantomData;

thread_local! {
    static GLOBAL: Cell<bool> = const { Cell::new(false) };
    static MODELS: RefCell<HashMap<String, bool>> = RefCell::new(HashMap::new());
}

pub struct Suppressor;

impl Suppressor {
    /// Whether global suppression is active in this execution context.
    pub fn suppressed() -> bool {
        GLOBAL.with(Cell::get)
    }

    /// Whether per-model suppression is active for `model`.
    pub fn model_suppressed(model: &str) -> bool {
        MODELS.with(|models| models.borrow().get(model).copied().unwrap_or(false))
    }

    /// Whether a broadcast originating from `model` is blocked on any axis.
    pub fn blocked(model: &str) -> bool {
        Self::suppressed() || Self::model_suppressed(model)
    }

    /// Activate global suppression until the returned guard drops.
    ///
    /// The guard restores the enclosing value, so scopes nest and unwind
    /// cleanly: dropping during a panic still restores.
    #[must_use = "suppression ends when the guard drops"]
    pub fn suppress() -> SuppressGuard {
        let previous = GLOBAL.with(|flag| flag.replace(true));
        SuppressGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with global suppression active.
    pub fn suppressing<R>(f: impl FnOnce() -> R) -> R {
        let _guard = Self::suppress();
        f()
    }

    /// Activate suppression for `model` until the returned guard drops.
    #[must_use = "suppression ends when the guard drops"]
    pub fn suppress_model(model: impl Into<String>) -> ModelSuppressGuard {
        let model = model.into();
        let previous = MODELS.with(|models| {
            models.borrow_mut().insert(model.clone(), true).unwrap_or(false)
        });
        ModelSuppressGuard {
            model,
            previous,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with suppression active for `model`.
    pub fn suppressing_model<R>(model: impl Into<String>, f: impl FnOnce() -> R) -> R {
        let _guard = Self::suppress_model(model);
        f()
    }
}

/// Restores the enclosing global suppression value on drop.
pub struct SuppressGuard {
    previous: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        GLOBAL.with(|flag| flag.set(self.previous));
    }
}

/// Restores the enclosing per-model suppression value on drop.
pub struct ModelSuppressGuard {
    model: String,
    previous: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ModelSuppressGuard {
    fn drop(&mut self) {
        MODELS.with(|models| {
            models.borrow_mut().insert(self.model.clone(), self.previous);
        });
    }
}
