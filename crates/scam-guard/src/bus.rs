//! Warning fan-out to whatever UI is currently listening.
//!
//! Delivery is synchronous, at most once per listener registered at the
//! time of the emit, with no buffering for late subscribers. A listener
//! that fails or panics is logged and skipped; the remaining listeners
//! still receive the message.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(&str) -> Result<(), ListenerError> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Listeners never run under the lock, so a poisoned registry is still consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-to-many warning channel.
///
/// Cheap to clone; clones share the same listener set.
#[derive(Clone, Default)]
pub struct NotificationBus {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Keep the returned [`Subscription`] to
    /// deregister it later; dropping it leaves the listener registered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));
        debug!(listener = id, "Warning listener subscribed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a listener that forwards every warning into a channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |message| {
            tx.send(message.to_string())
                .map_err(|_| ListenerError::from("warning receiver dropped"))
        });
        (subscription, rx)
    }

    /// Deliver a warning to every registered listener.
    ///
    /// Returns the number of listeners that accepted it.
    pub fn emit(&self, message: &str) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while handling.
        let listeners: Vec<(u64, Listener)> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(listener = id, error = %e, "Warning listener failed"),
                Err(_) => warn!(listener = id, "Warning listener panicked"),
            }
        }

        delivered
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Capability to deregister a listener.
#[derive(Debug)]
#[must_use = "dropping a Subscription leaves the listener registered"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => {
                let removed = lock(&registry).listeners.remove(&self.id).is_some();
                debug!(listener = self.id, removed, "Warning listener unsubscribed");
                removed
            }
            None => false,
        }
    }
}
