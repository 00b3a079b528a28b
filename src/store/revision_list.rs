//! Revision-ordered slot list and the revision allocator.
//!
//! Every mutation reserves a `(revision, slot index)` pair under a single
//! mutex, so the list is monotonically non-decreasing in revision by
//! construction. That invariant is what makes binary search by revision
//! correct, and it is load-bearing for list pagination and watch replay.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::warn;

use crate::object::StorageObject;
use crate::object::Versioner;

/// Upper bits of the initial revision. Combined with wall-clock microseconds
/// this keeps revisions moving forward across process restarts even without
/// durability, as long as the machine clock does not rewind.
const REVISION_BASE: u64 = 2 << 61;

lazy_static! {
    static ref MEMORY_REV: AtomicU64 = AtomicU64::new(REVISION_BASE + wall_clock_micros());
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// The highest revision assigned so far in this process.
pub(crate) fn current_revision() -> u64 {
    MEMORY_REV.load(Ordering::SeqCst)
}

/// One entry of the revision list: the object state a key had at one revision.
///
/// The slot a key's tree leaf points to is the current visible value for that
/// key; earlier list positions for the same key are tombstoned to `None`.
#[derive(Debug)]
pub(crate) struct Slot<O> {
    key: String,
    object: O,
    // This slot's own position in the revision list. Rewritten only by
    // shrink, which runs under the store's quiesce write lock.
    index: AtomicU64,
}

impl<O: StorageObject> Slot<O> {
    pub fn new(key: impl Into<String>, object: O, index: u64) -> Self {
        Self {
            key: key.into(),
            object,
            index: AtomicU64::new(index),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn object(&self) -> &O {
        &self.object
    }

    pub fn index(&self) -> u64 {
        self.index.load(Ordering::SeqCst)
    }

    pub fn set_index(&self, index: u64) {
        self.index.store(index, Ordering::SeqCst);
    }

    /// The revision stamped into this slot's object. The store stamps every
    /// stored copy before the slot is built, so an unparsable version here is
    /// an invariant violation and reads as 0.
    pub fn revision(&self) -> u64 {
        Versioner.object_resource_version(&self.object).unwrap_or(0)
    }
}

/// Append-only vector of slots in revision order, with `None` tombstones for
/// deleted and superseded entries.
#[derive(Debug)]
pub(crate) struct RevisionList<O> {
    slots: RwLock<Vec<Option<Arc<Slot<O>>>>>,
}

impl<O: StorageObject> RevisionList<O> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> u64 {
        self.slots.read().len() as u64
    }

    pub fn at(&self, index: u64) -> Option<Arc<Slot<O>>> {
        self.slots.read().get(index as usize).cloned().flatten()
    }

    /// Makes a reserved slot position visible.
    pub fn set(&self, index: u64, slot: Arc<Slot<O>>) {
        let mut slots = self.slots.write();
        match slots.get_mut(index as usize) {
            Some(entry) => *entry = Some(slot),
            None => warn!(index, len = slots.len(), "slot index out of bounds on set"),
        }
    }

    /// Tombstones a slot position.
    pub fn clear(&self, index: u64) {
        let mut slots = self.slots.write();
        if let Some(entry) = slots.get_mut(index as usize) {
            *entry = None;
        }
    }

    /// Snapshot of the list from `start` onward, tombstones included so that
    /// callers can account for positions when reporting remaining items.
    pub fn tail(&self, start: u64) -> Vec<Option<Arc<Slot<O>>>> {
        let slots = self.slots.read();
        match slots.get(start as usize..) {
            Some(tail) => tail.to_vec(),
            None => Vec::new(),
        }
    }

    /// Smallest index whose slot revision is >= `rev`, skipping tombstones;
    /// `len()` when no live slot qualifies.
    ///
    /// Tombstones make the underlying predicate non-monotonic, so probes land
    /// on the nearest live slot and ties resolve downward. The result may
    /// undershoot across a tombstone run, never overshoot: scans that start
    /// here re-check revisions, so an undershoot only costs skipped entries.
    pub fn binary_search_rev(&self, rev: u64) -> u64 {
        let slots = self.slots.read();
        let mut lo = 0usize;
        let mut hi = slots.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = slots[mid..hi].iter().position(Option::is_some);
            match probe {
                None => hi = mid,
                Some(offset) => match &slots[mid + offset] {
                    Some(slot) if slot.revision() >= rev => hi = mid,
                    Some(_) => lo = mid + offset + 1,
                    None => hi = mid,
                },
            }
        }
        lo as u64
    }

    /// Compacts tombstones away, rewriting every surviving slot's stored
    /// index. Only sound under the store's quiesce write lock: no slot index
    /// may be in flight anywhere while positions move.
    pub fn shrink(&self) -> (u64, u64) {
        let mut slots = self.slots.write();
        let old_len = slots.len();
        let mut fresh: Vec<Option<Arc<Slot<O>>>> = Vec::new();
        for slot in slots.iter().flatten() {
            slot.set_index(fresh.len() as u64);
            fresh.push(Some(Arc::clone(slot)));
        }
        let new_len = fresh.len();
        *slots = fresh;
        (old_len as u64, new_len as u64)
    }

    fn append_nil(&self) -> u64 {
        let mut slots = self.slots.write();
        let index = slots.len() as u64;
        slots.push(None);
        index
    }
}

/// Couples revision assignment with slot reservation.
///
/// Holding one mutex across "bump the counter" and "append the nil slot" is
/// what keeps list order equal to revision order without any reconciliation
/// logic. Writers serialize here and nowhere else.
#[derive(Debug, Default)]
pub(crate) struct RevisionAllocator {
    serial: Mutex<()>,
}

impl RevisionAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next revision and reserves the matching list position.
    pub fn reserve<O: StorageObject>(&self, list: &RevisionList<O>) -> (u64, u64) {
        let _serial = self.serial.lock();
        let rev = MEMORY_REV.fetch_add(1, Ordering::SeqCst) + 1;
        let index = list.append_nil();
        (rev, index)
    }

    /// Assigns a revision without a slot, for mutations that only need
    /// ordering (deletions remove their slot rather than adding one).
    pub fn reserve_revision(&self) -> u64 {
        let _serial = self.serial.lock();
        MEMORY_REV.fetch_add(1, Ordering::SeqCst) + 1
    }
}
