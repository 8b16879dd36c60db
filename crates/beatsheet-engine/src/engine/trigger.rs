//! Publish/subscribe registries for trigger-capable cells.
//!
//! A [`TriggerBus`] is created by the `BEAT` or `SEQ` builtin that produces
//! the cell and lives as long as that evaluation pass's value. Clones of a
//! structured value share the bus, so an `AUDIO` cell subscribing through a
//! cloned `BEAT` hears triggers sent to the one stored in the grid.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Callback invoked with the trigger value (on/off).
pub type Listener = Box<dyn FnMut(bool) + Send>;

/// Shared listener list.
#[derive(Clone, Default)]
pub struct TriggerBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl TriggerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener) {
        self.lock().push(listener);
    }

    /// Fan `value` out to every listener, in subscription order.
    ///
    /// Listeners run with the list unlocked, so they may subscribe to or
    /// trigger this bus. Listeners added during the fan-out are kept but not
    /// called until the next trigger.
    pub fn trigger(&self, value: bool) {
        let mut listeners = std::mem::take(&mut *self.lock());
        for listener in listeners.iter_mut() {
            listener(value);
        }
        let mut guard = self.lock();
        let added = std::mem::take(&mut *guard);
        *guard = listeners;
        guard.extend(added);
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// True if both handles point at the same listener list.
    pub fn same_bus(&self, other: &TriggerBus) -> bool {
        Arc::ptr_eq(&self.listeners, &other.listeners)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        // A listener that panicked leaves the list itself intact.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for TriggerBus {
    fn eq(&self, other: &Self) -> bool {
        self.same_bus(other)
    }
}

impl fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Capability of cells that an external scheduler can trigger and that
/// other cells can listen to.
pub trait Trigger {
    fn bus(&self) -> &TriggerBus;

    fn subscribe(&self, listener: Listener) {
        self.bus().subscribe(listener);
    }

    fn trigger(&self, value: bool) {
        self.bus().trigger(value);
    }
}
