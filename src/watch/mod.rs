//! Watch mechanism for streaming mutation events to subscribers.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────┐
//! │ MemoryStore  │
//! │  mutation    │
//! └──────┬───────┘
//!        │ broadcast(event)  [synchronous, after both indexes updated]
//!        ▼
//! ┌──────────────────┐
//! │    WatchHub      │ walks live watchers, prunes stopped ones,
//! │                  │ non-blocking try_send per watcher
//! └──────┬───────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ Per-watcher      │ (bounded mpsc; full queue = watcher dropped)
//! │ incoming queues  │
//! └──────┬───────────┘
//!        │ delivery loop: replay batch, then live tail
//!        ▼
//! ┌──────────────────┐
//! │ WatchHandle      │ consumer-paced result channel
//! └──────────────────┘
//! ```
//!
//! # Ordering
//!
//! Each watcher receives its matching events in strictly increasing revision
//! order: the delivery loop tracks the highest revision it has emitted and
//! drops anything at or below it. This both deduplicates the handoff between
//! historical replay and the live tail, and suppresses the rare
//! late-broadcast of a lower revision racing across the registration scan.
//!
//! # Slow consumers
//!
//! Enqueueing into a watcher's incoming queue never blocks the write path.
//! When the queue is full the watcher is marked stopped, pruned from the hub
//! at that broadcast, and its stream terminates with an error after the
//! events already queued drain. This is the only place events are
//! intentionally dropped.

mod event_cache;
mod hub;
mod watcher;


pub(crate) use event_cache::EventCache;
pub(crate) use hub::PendingWatch;
pub(crate) use hub::WatchHub;
pub(crate) use watcher::Watcher;
pub use watcher::WatchHandle;

/// What a mutation did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// One mutation, as delivered to watchers.
#[derive(Debug, Clone)]
pub struct Event<O> {
    /// Full key of the mutated object.
    pub key: String,
    /// Revision assigned to the mutation.
    pub revision: u64,
    pub kind: EventKind,
    /// Post-image of the object; `None` for [`EventKind::Deleted`].
    pub object: Option<O>,
    /// Pre-image of the object; `None` for [`EventKind::Created`], and
    /// stripped unless the watch was opened with old objects included.
    pub old_object: Option<O>,
}
