//! The store façade: revision-ordered object storage with streaming watch.
//!
//! Coordinates the key tree, the revision list, the revision allocator, and
//! the watch hub, and enforces the global quiesce gate. Every public
//! operation takes the gate's read side; only [`MemoryStore::stop`] and
//! [`MemoryStore::shrink`] take the write side, which gives shrink a
//! point-in-time snapshot where no slot index can be in flight.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::StoreConfig;
use crate::continuation::decode_continue;
use crate::continuation::encode_continue;
use crate::errors::Error;
use crate::errors::Result;
use crate::object::StorageObject;
use crate::object::Versioner;
use crate::options::GetOptions;
use crate::options::ListOptions;
use crate::options::Preconditions;
use crate::options::VersionMatch;
use crate::store::key_tree::KeyTree;
use crate::store::revision_list::current_revision;
use crate::store::revision_list::RevisionAllocator;
use crate::store::revision_list::RevisionList;
use crate::store::revision_list::Slot;
use crate::watch::Event;
use crate::watch::EventKind;
use crate::watch::WatchHandle;
use crate::watch::WatchHub;

/// One page of a list call.
#[derive(Debug, Clone)]
pub struct ObjectList<O> {
    /// Matching objects, in non-decreasing revision order.
    pub items: Vec<O>,
    /// The pivot revision of the list view (1 when no pivot was supplied).
    pub revision: u64,
    /// Resumption token, present when more matching slots may remain.
    pub continue_token: Option<String>,
    /// Upper bound on remaining slots, reported only for empty predicates.
    pub remaining_item_count: Option<i64>,
}

struct StoreInner<O: StorageObject> {
    config: StoreConfig,
    versioner: Versioner,
    // The quiesce gate ("freeze world"): read side for every public
    // operation, write side for stop and shrink.
    quiesce: RwLock<()>,
    allocator: RevisionAllocator,
    tree: KeyTree<O>,
    list: RevisionList<O>,
    hub: WatchHub<O>,
    shrink_task: Mutex<Option<CancellationToken>>,
}

/// Revision-ordered, in-memory object store with streaming watch.
///
/// Cheap to clone; clones share the same underlying store.
pub struct MemoryStore<O: StorageObject> {
    inner: Arc<StoreInner<O>>,
}

impl<O: StorageObject> std::fmt::Debug for MemoryStore<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl<O: StorageObject> Clone for MemoryStore<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: StorageObject> MemoryStore<O> {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let hub = WatchHub::new(&config);
        Ok(Self {
            inner: Arc::new(StoreInner {
                hub,
                config,
                versioner: Versioner,
                quiesce: RwLock::new(()),
                allocator: RevisionAllocator::new(),
                tree: KeyTree::new(),
                list: RevisionList::new(),
                shrink_task: Mutex::new(None),
            }),
        })
    }

    /// The revision codec this store stamps objects with.
    pub fn versioner(&self) -> &Versioner {
        &self.inner.versioner
    }

    /// Spawns the periodic shrink task. Idempotent. Requires a tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.shrink_task.lock();
        if task.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *task = Some(token.clone());

        let store = self.clone();
        let period = Duration::from_millis(self.inner.config.shrink_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval fires immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => store.shrink(),
                }
            }
            debug!("shrink task stopped");
        });
    }

    /// Stops the background shrink task and drains in-flight operations.
    ///
    /// Watchers are not cancelled here; the embedding layer owns their
    /// lifecycle and is expected to cancel them after stopping the store.
    pub fn stop(&self) {
        if let Some(token) = self.inner.shrink_task.lock().take() {
            token.cancel();
        }
        let _world = self.inner.quiesce.write();
    }

    /// Number of live objects under the prefix.
    pub fn count(&self, prefix: &str) -> Result<u64> {
        let _gate = self.inner.quiesce.read();
        let segments = split_prefix(prefix)?;
        Ok(self.inner.tree.count(&segments))
    }

    /// Stores a new object. Fails with [`Error::KeyExists`] when the key
    /// already holds one. Returns the stored copy, revision stamped.
    pub fn create(&self, key: &str, obj: &O) -> Result<O> {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        if inner.tree.get(&segments).is_some() {
            return Err(Error::KeyExists {
                key: key.to_string(),
            });
        }

        let (rev, index) = inner.allocator.reserve(&inner.list);
        let mut stored = obj.clone();
        inner.versioner.update_object_resource_version(&mut stored, rev);
        let slot = Arc::new(Slot::new(key, stored.clone(), index));
        inner.tree.insert(&segments, Arc::clone(&slot))?;
        inner.list.set(index, slot);

        inner.hub.broadcast(&Event {
            key: key.to_string(),
            revision: rev,
            kind: EventKind::Created,
            object: Some(stored.clone()),
            old_object: None,
        });
        debug!(
            key,
            revision = rev,
            elapsed_us = started.elapsed().as_micros() as u64,
            "created object"
        );
        Ok(stored)
    }

    /// Removes the object at the key after evaluating preconditions and the
    /// optional deletion validator. Returns the pre-image; the `Deleted`
    /// event carries the same deep copy.
    pub fn delete(
        &self,
        key: &str,
        preconditions: Option<&Preconditions>,
        validate: Option<&dyn Fn(&O) -> Result<()>>,
        cached: Option<&O>,
    ) -> Result<O> {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        if let Some(cached) = cached {
            inner.versioner.object_resource_version(cached)?;
        }

        let slot = inner.tree.get(&segments).ok_or_else(|| Error::KeyNotFound {
            key: key.to_string(),
        })?;
        let current = slot.object().clone();
        if let Some(preconditions) = preconditions {
            preconditions.check(key, &current)?;
        }
        if let Some(validate) = validate {
            validate(&current)?;
        }

        // A revision with no slot: deletions only need ordering, they do not
        // add a list entry.
        let rev = inner.allocator.reserve_revision();
        inner.tree.del(&segments, key)?;
        inner.list.clear(slot.index());

        inner.hub.broadcast(&Event {
            key: key.to_string(),
            revision: rev,
            kind: EventKind::Deleted,
            object: None,
            old_object: Some(current.clone()),
        });
        debug!(
            key,
            revision = rev,
            elapsed_us = started.elapsed().as_micros() as u64,
            "deleted object"
        );
        Ok(current)
    }

    /// Returns a deep copy of the current object.
    ///
    /// `opts.resource_version` is a *minimum*: when the current object's
    /// revision is below it, the call fails with
    /// [`Error::TooLargeResourceVersion`]. A missing key yields `Ok(None)`
    /// only under `opts.ignore_not_found`.
    pub fn get(&self, key: &str, opts: &GetOptions) -> Result<Option<O>> {
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        match inner.tree.get(&segments) {
            None => {
                if opts.ignore_not_found {
                    Ok(None)
                } else {
                    Err(Error::KeyNotFound {
                        key: key.to_string(),
                    })
                }
            }
            Some(slot) => {
                let obj = slot.object().clone();
                let obj_rev = inner.versioner.object_resource_version(&obj)?;
                validate_minimum_resource_version(
                    &inner.versioner,
                    &opts.resource_version,
                    obj_rev,
                )?;
                Ok(Some(obj))
            }
        }
    }

    /// Lists objects under a key (non-recursive) or key prefix (recursive),
    /// with pagination that survives intervening mutations.
    pub fn get_list(&self, key: &str, opts: &ListOptions<O>) -> Result<ObjectList<O>> {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();

        if !opts.recursive {
            return self.single_object_as_list(key, opts);
        }
        if key.trim_matches('/').is_empty() {
            return Err(Error::InvalidKey {
                key: key.to_string(),
                reason: "list prefix must be non-empty".to_string(),
            });
        }
        let key_prefix = if key.ends_with('/') {
            key.to_string()
        } else {
            format!("{key}/")
        };

        let requested_rv = if opts.resource_version.is_empty() {
            None
        } else {
            Some(inner.versioner.parse_resource_version(&opts.resource_version)?)
        };

        let mut returned_rv = 1u64;
        let mut with_rv = 0u64;
        let mut start_index = 0u64;
        let mut continue_key: Option<String> = None;
        if let Some(token) = &opts.predicate.continue_token {
            if !opts.resource_version.is_empty() && opts.resource_version != "0" {
                return Err(Error::InvalidContinueToken {
                    reason: "resource version may not be specified with a continue token"
                        .to_string(),
                });
            }
            let (resume_key, continue_rv) = decode_continue(token, &key_prefix)?;
            if continue_rv == 0 {
                return Err(Error::InvalidContinueToken {
                    reason: "continue token carries no resource version".to_string(),
                });
            }
            with_rv = continue_rv;
            returned_rv = continue_rv;
            // Resume from the continue key's own slot when it is still at the
            // token's revision; if it moved underneath us, fall back to a
            // binary search by that revision.
            let resume_segments = split_key(&resume_key)?;
            start_index = match inner.tree.get(&resume_segments) {
                Some(slot) if slot.revision() == with_rv => slot.index(),
                _ => inner.list.binary_search_rev(with_rv),
            };
            continue_key = Some(resume_key);
        } else if let Some(rv) = requested_rv {
            if rv > 0 {
                with_rv = rv;
                returned_rv = rv;
                start_index = inner.list.binary_search_rev(rv);
            }
        }

        if start_index >= inner.list.len() {
            return Ok(ObjectList {
                items: Vec::new(),
                revision: returned_rv,
                continue_token: None,
                remaining_item_count: None,
            });
        }

        let limit = opts.predicate.limit;
        let snapshot = inner.list.tail(start_index);
        let mut items: Vec<O> = Vec::new();
        let mut last_key = String::new();
        let mut last_rev = with_rv;
        let mut remaining: i64 = 0;
        let mut has_more = false;
        for (i, entry) in snapshot.iter().enumerate() {
            if let Some(slot) = entry {
                last_key = slot.key().to_string();
                last_rev = slot.revision();
                let resumed_at = continue_key.as_deref() == Some(slot.key());
                if last_key.starts_with(&key_prefix) && !resumed_at {
                    let include = match opts.version_match {
                        Some(VersionMatch::NotOlderThan) => last_rev >= with_rv,
                        Some(VersionMatch::Exact) | None => last_rev > with_rv,
                    };
                    if include && opts.predicate.matches(slot.object()) {
                        items.push(slot.object().clone());
                    }
                }
            }
            if limit > 0 && items.len() >= limit {
                if i + 1 < snapshot.len() {
                    remaining = (snapshot.len() - 1 - i) as i64;
                    has_more = true;
                }
                break;
            }
        }

        debug!(
            prefix = %key_prefix,
            items = items.len(),
            has_more,
            elapsed_us = started.elapsed().as_micros() as u64,
            "listed objects"
        );
        if has_more {
            let token = encode_continue(&last_key, &key_prefix, last_rev)?;
            let remaining_item_count = opts.predicate.is_empty().then_some(remaining);
            return Ok(ObjectList {
                items,
                revision: returned_rv,
                continue_token: Some(token),
                remaining_item_count,
            });
        }
        Ok(ObjectList {
            items,
            revision: returned_rv,
            continue_token: None,
            remaining_item_count: None,
        })
    }

    /// Reads the current object, runs the caller's mutator on a deep copy,
    /// and writes the result back under an optimistic check against the
    /// revision that was read.
    ///
    /// This entry point does not loop; a caller that wants retry-on-conflict
    /// re-reads and calls again. A stale `cached` object is only worth a
    /// warning — the authoritative state is the store's own copy.
    pub fn guaranteed_update<F>(
        &self,
        key: &str,
        ignore_not_found: bool,
        preconditions: Option<&Preconditions>,
        try_update: F,
        cached: Option<&O>,
    ) -> Result<Option<O>>
    where
        F: FnOnce(O) -> Result<O>,
    {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        let slot = match inner.tree.get(&segments) {
            Some(slot) => slot,
            None => {
                return if ignore_not_found {
                    Ok(None)
                } else {
                    Err(Error::KeyNotFound {
                        key: key.to_string(),
                    })
                };
            }
        };
        let current = slot.object().clone();
        let current_rev = inner.versioner.object_resource_version(&current)?;

        if let Some(cached) = cached {
            let cached_rev = inner.versioner.object_resource_version(cached)?;
            if cached_rev != current_rev {
                warn!(
                    key,
                    cached_rev, current_rev, "cached existing object resource version is stale"
                );
            }
        }
        if let Some(preconditions) = preconditions {
            preconditions.check(key, &current)?;
        }

        let updated = try_update(current.clone())?;
        let stored = self.replace_slot(key, &segments, &slot, &current, current_rev, updated)?;
        debug!(
            key,
            elapsed_us = started.elapsed().as_micros() as u64,
            "updated object"
        );
        Ok(Some(stored))
    }

    /// Creates the object when absent; otherwise merges the supplied object
    /// into the current one via `merge` and stores the result. The update
    /// branch requires a merge function and fails with
    /// [`Error::MergeUnsupported`] without one.
    pub fn create_or_update(
        &self,
        key: &str,
        obj: &O,
        merge: Option<&dyn Fn(&O, &mut O) -> Result<()>>,
    ) -> Result<O> {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        let stored = match inner.tree.get(&segments) {
            None => self.insert_new(key, &segments, obj)?,
            Some(slot) => {
                let current = slot.object().clone();
                let current_rev = inner.versioner.object_resource_version(&current)?;
                let merge = merge.ok_or_else(|| Error::MergeUnsupported {
                    key: key.to_string(),
                })?;
                let mut merged = obj.clone();
                merge(&current, &mut merged)?;
                self.replace_slot(key, &segments, &slot, &current, current_rev, merged)?
            }
        };
        debug!(
            key,
            elapsed_us = started.elapsed().as_micros() as u64,
            "created or updated object"
        );
        Ok(stored)
    }

    /// Stores the supplied object wholesale, creating the key when absent and
    /// replacing the current object otherwise.
    pub fn create_or_replace(&self, key: &str, obj: &O) -> Result<O> {
        let started = Instant::now();
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        let stored = match inner.tree.get(&segments) {
            None => self.insert_new(key, &segments, obj)?,
            Some(slot) => {
                let current = slot.object().clone();
                let current_rev = inner.versioner.object_resource_version(&current)?;
                self.replace_slot(key, &segments, &slot, &current, current_rev, obj.clone())?
            }
        };
        debug!(
            key,
            elapsed_us = started.elapsed().as_micros() as u64,
            "created or replaced object"
        );
        Ok(stored)
    }

    /// Returns the current object when present; otherwise creates it from the
    /// supplied template. Never mutates an existing object.
    pub fn get_or_create(&self, key: &str, obj: &O) -> Result<O> {
        let inner = &self.inner;
        let _gate = inner.quiesce.read();
        let segments = split_key(key)?;

        match inner.tree.get(&segments) {
            Some(slot) => Ok(slot.object().clone()),
            None => self.insert_new(key, &segments, obj),
        }
    }

    /// Opens a watch on a key or key prefix. Events carry no pre-images; use
    /// [`MemoryStore::watch_with_old_obj`] to include them.
    ///
    /// A resource version of `""` or `"0"` starts the stream at the current
    /// maximum revision (live tail only); any higher value first replays the
    /// live state at or after it as synthetic `Created` events, per the match
    /// rule. Requires a tokio runtime.
    pub fn watch(&self, key: &str, opts: &ListOptions<O>) -> Result<WatchHandle<O>> {
        self.watch_inner(key, opts, false)
    }

    /// [`MemoryStore::watch`], with pre-images included on `Updated` and
    /// `Deleted` events.
    pub fn watch_with_old_obj(&self, key: &str, opts: &ListOptions<O>) -> Result<WatchHandle<O>> {
        self.watch_inner(key, opts, true)
    }

    /// Applies `updated_obj` through [`MemoryStore::guaranteed_update`]; when
    /// the stored result signals deletion (deletion timestamp set, finalizers
    /// empty), deletes it under the same preconditions. A failure of the
    /// inner delete is surfaced.
    pub fn ensure_update_and_delete(
        &self,
        key: &str,
        ignore_not_found: bool,
        preconditions: Option<&Preconditions>,
        updated_obj: O,
    ) -> Result<Option<O>> {
        let updated = self.guaranteed_update(
            key,
            ignore_not_found,
            preconditions,
            move |_current| Ok(updated_obj),
            None,
        )?;
        match updated {
            None => Ok(None),
            Some(obj) => {
                if obj.should_delete() {
                    let deleted = self.delete(key, preconditions, None, Some(&obj))?;
                    Ok(Some(deleted))
                } else {
                    Ok(Some(obj))
                }
            }
        }
    }

    /// Compacts the revision list when tombstones have accumulated past the
    /// configured slack. Takes the quiesce write lock: slot indexes are not
    /// stable across compaction, so nothing else may hold one.
    pub fn shrink(&self) {
        let inner = &self.inner;
        let _world = inner.quiesce.write();
        let live = inner.tree.count(&[]);
        let len = inner.list.len();
        if len > live + inner.config.shrink_slack {
            let (old_len, new_len) = inner.list.shrink();
            debug!(old_len, new_len, live, "shrunk revision list");
        }
    }

    /// Number of watchers currently registered on the hub.
    pub fn watcher_count(&self) -> usize {
        self.inner.hub.watcher_count()
    }

    /// The most recent `n` broadcast events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<Event<O>> {
        self.inner.hub.recent_events(n)
    }

    // Create path shared by create / create-or-* / get-or-create. Caller
    // holds the quiesce read lock and has seen the key absent; the tree
    // insert re-checks, so a racing creator surfaces as KeyExists.
    fn insert_new(&self, key: &str, segments: &[String], obj: &O) -> Result<O> {
        let inner = &self.inner;
        let (rev, index) = inner.allocator.reserve(&inner.list);
        let mut stored = obj.clone();
        inner.versioner.update_object_resource_version(&mut stored, rev);
        let slot = Arc::new(Slot::new(key, stored.clone(), index));
        inner.tree.insert(segments, Arc::clone(&slot))?;
        inner.list.set(index, slot);

        inner.hub.broadcast(&Event {
            key: key.to_string(),
            revision: rev,
            kind: EventKind::Created,
            object: Some(stored.clone()),
            old_object: None,
        });
        Ok(stored)
    }

    // Update path shared by guaranteed-update / create-or-* update branches.
    // Writes the new slot under an optimistic check against `current_rev`,
    // tombstones the old slot, and broadcasts the Updated event.
    fn replace_slot(
        &self,
        key: &str,
        segments: &[String],
        old_slot: &Arc<Slot<O>>,
        current: &O,
        current_rev: u64,
        new_obj: O,
    ) -> Result<O> {
        let inner = &self.inner;
        let (rev, index) = inner.allocator.reserve(&inner.list);
        let mut stored = new_obj;
        inner.versioner.update_object_resource_version(&mut stored, rev);
        let slot = Arc::new(Slot::new(key, stored.clone(), index));
        inner.tree.put(segments, Arc::clone(&slot), current_rev)?;
        inner.list.clear(old_slot.index());
        inner.list.set(index, slot);

        inner.hub.broadcast(&Event {
            key: key.to_string(),
            revision: rev,
            kind: EventKind::Updated,
            object: Some(stored.clone()),
            old_object: Some(current.clone()),
        });
        Ok(stored)
    }

    fn watch_inner(&self, key: &str, opts: &ListOptions<O>, with_old: bool) -> Result<WatchHandle<O>> {
        let inner = &self.inner;
        let requested = inner.versioner.parse_resource_version(&opts.resource_version)?;
        let _gate = inner.quiesce.read();
        if key.trim_matches('/').is_empty() {
            return Err(Error::InvalidKey {
                key: key.to_string(),
                reason: "watch key must be non-empty".to_string(),
            });
        }
        let prefix = if opts.recursive && !key.ends_with('/') {
            format!("{key}/")
        } else {
            key.to_string()
        };

        // Join the fan-out first, then scan: every mutation from here on is
        // in the replay scan, the incoming queue, or both. The delivery
        // loop's revision guard collapses the overlap.
        let start_revision = if requested > 1 {
            requested
        } else {
            current_revision()
        };
        let pending = inner.hub.register(
            prefix.clone(),
            start_revision,
            opts.predicate.clone(),
            with_old,
            &inner.config,
        );

        let (replay, horizon) = if requested > 1 {
            let replay = self.events_after(requested, &prefix, opts.version_match);
            let base = match opts.version_match {
                Some(VersionMatch::NotOlderThan) => requested.saturating_sub(1),
                _ => requested,
            };
            let horizon = replay
                .last()
                .map(|event| event.revision)
                .unwrap_or(0)
                .max(base);
            (replay, horizon)
        } else {
            (Vec::new(), start_revision)
        };

        Ok(inner.hub.start(pending, replay, horizon))
    }

    // Synthetic Created events for the live state at or after `rev`, filtered
    // by prefix and match rule. Replay input for new watchers.
    fn events_after(
        &self,
        rev: u64,
        prefix: &str,
        version_match: Option<VersionMatch>,
    ) -> Vec<Event<O>> {
        let inner = &self.inner;
        let start = inner.list.binary_search_rev(rev);
        let mut events = Vec::new();
        for index in start..inner.list.len() {
            let slot = match inner.list.at(index) {
                Some(slot) => slot,
                None => continue,
            };
            if !slot.key().starts_with(prefix) {
                continue;
            }
            let slot_rev = slot.revision();
            let include = match version_match {
                Some(VersionMatch::NotOlderThan) => slot_rev >= rev,
                Some(VersionMatch::Exact) | None => slot_rev > rev,
            };
            if include {
                events.push(Event {
                    key: slot.key().to_string(),
                    revision: slot_rev,
                    kind: EventKind::Created,
                    object: Some(slot.object().clone()),
                    old_object: None,
                });
            }
        }
        events
    }

    fn single_object_as_list(&self, key: &str, opts: &ListOptions<O>) -> Result<ObjectList<O>> {
        let inner = &self.inner;
        let segments = split_key(key)?;
        let requested_rv = if opts.resource_version.is_empty() {
            None
        } else {
            Some(inner.versioner.parse_resource_version(&opts.resource_version)?)
        };

        match inner.tree.get(&segments) {
            None => Ok(ObjectList {
                items: Vec::new(),
                revision: current_revision(),
                continue_token: None,
                remaining_item_count: None,
            }),
            Some(slot) => {
                let rv = slot.revision();
                let include = match requested_rv {
                    None => true,
                    Some(pivot) => match opts.version_match {
                        Some(VersionMatch::NotOlderThan) => rv >= pivot,
                        Some(VersionMatch::Exact) => rv == pivot,
                        None => rv > pivot,
                    },
                };
                let mut items = Vec::new();
                if include && opts.predicate.matches(slot.object()) {
                    items.push(slot.object().clone());
                }
                Ok(ObjectList {
                    items,
                    revision: rv,
                    continue_token: None,
                    remaining_item_count: None,
                })
            }
        }
    }
}

// Too-new minimums are the caller telling us about state we have not seen;
// nothing to do but refuse.
fn validate_minimum_resource_version(
    versioner: &Versioner,
    minimum: &str,
    actual: u64,
) -> Result<()> {
    if minimum.is_empty() {
        return Ok(());
    }
    let minimum = versioner.parse_resource_version(minimum)?;
    if minimum > actual {
        return Err(Error::TooLargeResourceVersion {
            requested: minimum,
            current: actual,
        });
    }
    Ok(())
}

fn split_key(key: &str) -> Result<Vec<String>> {
    let trimmed = key.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key must be non-empty".to_string(),
        });
    }
    let segments: Vec<String> = trimmed.split('/').map(String::from).collect();
    if segments.iter().any(String::is_empty) {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key contains empty segments".to_string(),
        });
    }
    Ok(segments)
}

// Prefixes may be empty ("count everything") where keys may not.
fn split_prefix(prefix: &str) -> Result<Vec<String>> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<String> = trimmed.split('/').map(String::from).collect();
    if segments.iter().any(String::is_empty) {
        return Err(Error::InvalidKey {
            key: prefix.to_string(),
            reason: "prefix contains empty segments".to_string(),
        });
    }
    Ok(segments)
}
