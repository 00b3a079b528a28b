//! Bounded ring of the most recent mutation events.
//!
//! Appended on every broadcast; a diagnostic surface for the layer embedding
//! the store. Watch replay is derived from the revision list, not from here,
//! so eviction can never lose a watcher an event.

use std::collections::VecDeque;

use parking_lot::RwLock;

use crate::object::StorageObject;
use crate::watch::Event;

pub(crate) struct EventCache<O> {
    capacity: usize,
    events: RwLock<VecDeque<Event<O>>>,
}

impl<O: StorageObject> EventCache<O> {
    /// Capacity 0 disables the cache entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: RwLock::new(VecDeque::new()),
        }
    }

    pub fn push(&self, event: Event<O>) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.write();
        events.push_back(event);
        while events.len() > self.capacity {
            events.pop_front();
        }
    }

    /// The most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Event<O>> {
        let events = self.events.read();
        let skip = events.len().saturating_sub(n);
        events.iter().skip(skip).cloned().collect()
    }
}
