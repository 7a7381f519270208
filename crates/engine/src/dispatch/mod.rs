//! Event fan-out to subscribers
//!
//! Handlers are keyed by event type; the [`WILDCARD`] key receives every
//! event after the type-specific handlers have run. A panicking handler is
//! contained and logged so its siblings still run.
//!
//! Each dispatch snapshots the handler list, then re-checks every entry just
//! before invoking it. A handler disposed while a dispatch is in progress is
//! therefore skipped if it has not run yet, even for the event currently being
//! dispatched. Handlers added during a dispatch only see later events.

use signage_core::{LiveEvent, WILDCARD};
use signage_persistence::EventHistory;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error};

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&LiveEvent) + Send + Sync>;

struct Entry {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<String, Vec<Entry>>,
}

impl Registry {
    fn contains(&self, event_type: &str, id: u64) -> bool {
        self.handlers
            .get(event_type)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }

    fn remove(&mut self, event_type: &str, id: u64) -> bool {
        let Some(entries) = self.handlers.get_mut(event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.handlers.remove(event_type);
        }
        removed
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Disposer for one registered handler.
///
/// Dropping a `Subscription` does not unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe).
pub struct Subscription {
    event_type: String,
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove exactly this handler. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if lock(&registry).remove(&self.event_type, self.id) {
                debug!(event_type = %self.event_type, id = self.id, "Handler unsubscribed");
            }
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether the handler is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| lock(&registry).contains(&self.event_type, self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .finish()
    }
}

/// Per-event-type handler registry with a bounded history of dispatched events
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
    history: EventHistory,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::with_history(EventHistory::default())
    }

    pub fn with_history(history: EventHistory) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            history,
        }
    }

    /// Register `handler` for `event_type` (or [`WILDCARD`])
    pub fn subscribe<F>(&self, event_type: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(event_type.clone())
            .or_default()
            .push(Entry {
                id,
                handler: Arc::new(handler),
            });

        debug!(event_type = %event_type, id, "Handler subscribed");
        Subscription {
            event_type,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Build an event stamped now and fan it out
    pub fn dispatch(&self, event_type: &str, data: serde_json::Value) -> LiveEvent {
        self.dispatch_event(LiveEvent::new(event_type, data))
    }

    /// Record `event` in history, then run the type-specific handlers
    /// followed by the wildcard handlers, each in registration order
    pub fn dispatch_event(&self, event: LiveEvent) -> LiveEvent {
        self.history.push(event.clone());

        for (key, id, handler) in self.targets(&event.event_type) {
            if !lock(&self.registry).contains(&key, id) {
                continue;
            }
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                error!(
                    event_type = %event.event_type,
                    handler = id,
                    "Event handler panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }

        event
    }

    fn targets(&self, event_type: &str) -> Vec<(String, u64, Handler)> {
        let registry = lock(&self.registry);
        let mut keys = vec![event_type];
        if event_type != WILDCARD {
            keys.push(WILDCARD);
        }

        keys.into_iter()
            .flat_map(|key| {
                registry
                    .handlers
                    .get(key)
                    .into_iter()
                    .flatten()
                    .map(move |e| (key.to_string(), e.id, Arc::clone(&e.handler)))
            })
            .collect()
    }

    /// Number of handlers registered for `event_type`
    pub fn handler_count(&self, event_type: &str) -> usize {
        lock(&self.registry)
            .handlers
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Event types that currently have at least one handler
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<_> = lock(&self.registry).handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn last_event(&self) -> Option<LiveEvent> {
        self.history.latest()
    }

    /// Recent events, oldest first
    pub fn history(&self) -> Vec<LiveEvent> {
        self.history.snapshot()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
