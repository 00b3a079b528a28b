//! Registry of live watchers and the broadcast fan-out.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::config::StoreConfig;
use crate::errors::Result;
use crate::object::StorageObject;
use crate::selection::SelectionPredicate;
use crate::watch::watcher;
use crate::watch::watcher::Watcher;
use crate::watch::Event;
use crate::watch::EventCache;
use crate::watch::WatchHandle;

/// A watcher that has joined the fan-out but whose delivery loop has not been
/// spawned yet.
///
/// Registration and delivery start are split so the store can compute the
/// replay batch *after* the watcher is already receiving broadcasts: every
/// mutation then lands in the replay scan, the incoming queue, or both — never
/// neither. The delivery loop's revision guard collapses the overlap.
pub(crate) struct PendingWatch<O: StorageObject> {
    watcher: Arc<Watcher<O>>,
    incoming_rx: mpsc::Receiver<Event<O>>,
    outgoing_tx: mpsc::Sender<Result<Event<O>>>,
    outgoing_rx: mpsc::Receiver<Result<Event<O>>>,
}

pub(crate) struct WatchHub<O: StorageObject> {
    watchers: Mutex<Vec<Arc<Watcher<O>>>>,
    cache: EventCache<O>,
    next_id: AtomicU64,
}

impl<O: StorageObject> WatchHub<O> {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            watchers: Mutex::new(Vec::new()),
            cache: EventCache::new(config.event_cache_capacity),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a watcher into the fan-out and allocates its channels.
    pub fn register(
        &self,
        prefix: String,
        start_revision: u64,
        predicate: SelectionPredicate<O>,
        include_old_object: bool,
        config: &StoreConfig,
    ) -> PendingWatch<O> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (incoming_tx, incoming_rx) = mpsc::channel(config.watcher_incoming_buffer);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(config.watcher_outgoing_buffer);

        let watcher = Arc::new(Watcher::new(
            id,
            prefix,
            start_revision,
            predicate,
            include_old_object,
            incoming_tx,
        ));
        self.watchers.lock().push(Arc::clone(&watcher));
        trace!(watcher_id = id, start_revision, "watcher registered");

        PendingWatch {
            watcher,
            incoming_rx,
            outgoing_tx,
            outgoing_rx,
        }
    }

    /// Spawns the delivery loop for a registered watcher.
    ///
    /// `replay` holds synthetic events covering state at or after the start
    /// revision, already prefix- and revision-filtered by the registration
    /// scan; `horizon` is the highest revision that scan covered.
    pub fn start(
        &self,
        pending: PendingWatch<O>,
        replay: Vec<Event<O>>,
        horizon: u64,
    ) -> WatchHandle<O> {
        tokio::spawn(watcher::run(
            Arc::clone(&pending.watcher),
            pending.incoming_rx,
            pending.outgoing_tx,
            replay,
            horizon,
        ));
        WatchHandle::new(pending.watcher, pending.outgoing_rx)
    }

    /// Fans a mutation event out to every live watcher, pruning stopped and
    /// overflowed ones in place. Called synchronously at the end of each
    /// successful mutation, after the slot is visible in both indexes.
    pub fn broadcast(&self, event: &Event<O>) {
        self.cache.push(event.clone());
        let mut watchers = self.watchers.lock();
        watchers.retain(|watcher| watcher.enqueue(event.clone()));
    }

    /// Number of currently registered watchers, including ones that stopped
    /// since the last broadcast pruned the list.
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    /// The most recent `n` broadcast events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event<O>> {
        self.cache.recent(n)
    }
}
