//! A single watch subscription and its delivery loop.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use tracing::warn;

use crate::errors::Error;
use crate::errors::Result;
use crate::object::StorageObject;
use crate::selection::SelectionPredicate;
use crate::watch::Event;

/// Internal watcher state shared between the hub and the delivery loop.
pub(crate) struct Watcher<O: StorageObject> {
    id: u64,
    prefix: String,
    start_revision: u64,
    predicate: SelectionPredicate<O>,
    include_old_object: bool,
    incoming: mpsc::Sender<Event<O>>,
    stopped: AtomicBool,
    overflowed: AtomicBool,
    cancel: CancellationToken,
}

impl<O: StorageObject> Watcher<O> {
    pub fn new(
        id: u64,
        prefix: String,
        start_revision: u64,
        predicate: SelectionPredicate<O>,
        include_old_object: bool,
        incoming: mpsc::Sender<Event<O>>,
    ) -> Self {
        Self {
            id,
            prefix,
            start_revision,
            predicate,
            include_old_object,
            incoming,
            stopped: AtomicBool::new(false),
            overflowed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_revision(&self) -> u64 {
        self.start_revision
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Terminal and absorbing: once stopped, a watcher never delivers again.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Non-blocking enqueue from the broadcast path. Returns `false` when the
    /// watcher should be pruned from the hub.
    pub fn enqueue(&self, event: Event<O>) -> bool {
        if self.is_stopped() {
            return false;
        }
        match self.incoming.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // The writer path is never blocked by a watcher; the slow
                // consumer loses its subscription instead.
                warn!(
                    watcher_id = self.id,
                    prefix = %self.prefix,
                    "watcher incoming queue full, dropping watcher"
                );
                self.overflowed.store(true, Ordering::SeqCst);
                self.stop();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.stop();
                false
            }
        }
    }

    fn event_matches(&self, event: &Event<O>) -> bool {
        match event.object.as_ref().or(event.old_object.as_ref()) {
            Some(obj) => self.predicate.matches(obj),
            None => true,
        }
    }

    fn shape(&self, mut event: Event<O>) -> Event<O> {
        if !self.include_old_object {
            event.old_object = None;
        }
        event
    }
}

/// Delivery loop: drains the replay batch, then tails the live queue.
///
/// `horizon` is the highest revision already covered by the replay scan; any
/// live event at or below it is a duplicate of (or was superseded by) replay
/// and is dropped, which keeps the delivered stream strictly increasing in
/// revision across the replay/live handoff.
pub(crate) async fn run<O: StorageObject>(
    watcher: Arc<Watcher<O>>,
    mut incoming: mpsc::Receiver<Event<O>>,
    outgoing: mpsc::Sender<Result<Event<O>>>,
    replay: Vec<Event<O>>,
    mut horizon: u64,
) {
    trace!(watcher_id = watcher.id, prefix = %watcher.prefix, "watcher delivery loop started");

    for event in replay {
        if !watcher.event_matches(&event) {
            continue;
        }
        if outgoing.send(Ok(watcher.shape(event))).await.is_err() {
            watcher.stop();
            trace!(watcher_id = watcher.id, "watch consumer went away during replay");
            return;
        }
    }

    loop {
        tokio::select! {
            biased;

            _ = watcher.cancel.cancelled() => break,

            received = incoming.recv() => match received {
                Some(event) => {
                    if event.revision <= horizon {
                        continue;
                    }
                    if !event.key.starts_with(&watcher.prefix) {
                        continue;
                    }
                    if !watcher.event_matches(&event) {
                        continue;
                    }
                    horizon = event.revision;
                    if outgoing.send(Ok(watcher.shape(event))).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if watcher.overflowed.load(Ordering::SeqCst) {
        // Consumer-paced so the terminal error is not lost behind a full
        // channel; a vanished consumer makes this send fail immediately.
        let _ = outgoing
            .send(Err(Error::internal(format!(
                "watch on '{}' dropped: consumer too slow for event volume",
                watcher.prefix
            ))))
            .await;
    }
    watcher.stop();
    trace!(watcher_id = watcher.id, prefix = %watcher.prefix, "watcher delivery loop stopped");
}

/// A live watch subscription, as handed to callers.
///
/// Events arrive in strictly increasing revision order. The stream ends when
/// the watch is stopped or cancelled; a slow-consumer drop surfaces one final
/// `Err` before the end. Dropping the handle stops the watch.
pub struct WatchHandle<O: StorageObject> {
    watcher: Arc<Watcher<O>>,
    receiver: mpsc::Receiver<Result<Event<O>>>,
}

impl<O: StorageObject> std::fmt::Debug for WatchHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").finish_non_exhaustive()
    }
}

impl<O: StorageObject> WatchHandle<O> {
    pub(crate) fn new(
        watcher: Arc<Watcher<O>>,
        receiver: mpsc::Receiver<Result<Event<O>>>,
    ) -> Self {
        Self { watcher, receiver }
    }

    /// Unique identifier of this watch.
    pub fn id(&self) -> u64 {
        self.watcher.id()
    }

    /// The revision this watch started from.
    pub fn start_revision(&self) -> u64 {
        self.watcher.start_revision()
    }

    /// Receives the next event; `None` once the stream has terminated.
    pub async fn recv(&mut self) -> Option<Result<Event<O>>> {
        self.receiver.recv().await
    }

    /// Stops the watch. The stream drains whatever was already delivered and
    /// then terminates.
    pub fn stop(&self) {
        self.watcher.stop();
    }
}

impl<O: StorageObject> Drop for WatchHandle<O> {
    fn drop(&mut self) {
        self.watcher.stop();
    }
}
