//! Object capability contract and resource-version handling.
//!
//! The store treats stored values as opaque except through [`StorageObject`]:
//! it reads and stamps the resource version, extracts the name, and probes the
//! deletion markers that drive [`MemoryStore::ensure_update_and_delete`].
//! Deep copy is `Clone`; objects own their data, so a clone is a full snapshot
//! and callers can never mutate what the store holds.
//!
//! [`MemoryStore::ensure_update_and_delete`]: crate::MemoryStore::ensure_update_and_delete

use crate::errors::Error;
use crate::errors::Result;

/// Capability the store requires from every stored object type.
///
/// Resource versions cross this boundary as decimal strings; `""` means
/// "unset". The store is the only writer of the field: every successful
/// mutation stamps the newly assigned revision into the stored copy and the
/// returned copy.
pub trait StorageObject: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Current resource version as a decimal string, `""` when unset.
    fn resource_version(&self) -> &str;

    /// Overwrites the resource version.
    fn set_resource_version(&mut self, rv: String);

    /// Object name, the last segment of its key.
    fn name(&self) -> &str;

    /// Unique id used by precondition checks. Defaults to `""` for object
    /// types that do not carry one.
    fn uid(&self) -> &str {
        ""
    }

    /// Whether a deletion timestamp has been set on the object.
    fn deletion_timestamp_set(&self) -> bool {
        false
    }

    /// Whether the finalizer list is empty.
    fn finalizers_empty(&self) -> bool {
        true
    }

    /// Whether the object's spec signals it should now be removed: deletion
    /// requested and no finalizers left holding it.
    fn should_delete(&self) -> bool {
        self.deletion_timestamp_set() && self.finalizers_empty()
    }
}

/// Codec between u64 revisions and their decimal-string wire form.
#[derive(Debug, Clone, Copy, Default)]
pub struct Versioner;

impl Versioner {
    /// Parses a resource version string. `""` parses as 0 ("unspecified").
    pub fn parse_resource_version(&self, rv: &str) -> Result<u64> {
        if rv.is_empty() {
            return Ok(0);
        }
        rv.parse::<u64>().map_err(|_| Error::InvalidResourceVersion {
            given: rv.to_string(),
        })
    }

    /// Reads an object's revision. An unset resource version reads as 0.
    pub fn object_resource_version<O: StorageObject>(&self, obj: &O) -> Result<u64> {
        self.parse_resource_version(obj.resource_version())
    }

    /// Stamps a revision into an object as its decimal-string form.
    pub fn update_object_resource_version<O: StorageObject>(&self, obj: &mut O, revision: u64) {
        obj.set_resource_version(revision.to_string());
    }
}
