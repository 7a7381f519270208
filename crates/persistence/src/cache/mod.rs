//! Bounded in-memory history of received events
//!
//! Kept for debugging and introspection only; it is not a replay log.

use signage_core::LiveEvent;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of events retained by default
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Thread-safe FIFO window over the most recent events
pub struct EventHistory {
    events: RwLock<VecDeque<LiveEvent>>,
    capacity: usize,
}

impl EventHistory {
    /// Create a history keeping at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<LiveEvent>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<LiveEvent>> {
        self.events.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, evicting the oldest ones past capacity
    pub fn push(&self, event: LiveEvent) {
        let mut events = self.write();
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }

    /// Most recently received event
    pub fn latest(&self) -> Option<LiveEvent> {
        self.read().back().cloned()
    }

    /// Copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<LiveEvent> {
        self.read().iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained event
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Get current number of retained events
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}
