//! Per-call option structs for the store's public operations.

use crate::errors::Error;
use crate::errors::Result;
use crate::object::StorageObject;
use crate::object::Versioner;
use crate::selection::SelectionPredicate;

/// Rule for interpreting a supplied resource version during list and watch.
///
/// Absent (`None` in [`ListOptions::version_match`]) behaves as [`Exact`] for
/// list and watch streams.
///
/// [`Exact`]: VersionMatch::Exact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMatch {
    /// Include items at or after the supplied revision.
    NotOlderThan,
    /// Include items strictly after the supplied revision (the list view
    /// returns things after the pivot).
    Exact,
}

impl VersionMatch {
    /// Parses the wire form. `""` means unspecified; anything unrecognized is
    /// an [`Error::UnknownMatchMode`].
    pub fn parse(s: &str) -> Result<Option<VersionMatch>> {
        match s {
            "" => Ok(None),
            "NotOlderThan" => Ok(Some(VersionMatch::NotOlderThan)),
            "Exact" => Ok(Some(VersionMatch::Exact)),
            other => Err(Error::UnknownMatchMode(other.to_string())),
        }
    }

    /// The wire form of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionMatch::NotOlderThan => "NotOlderThan",
            VersionMatch::Exact => "Exact",
        }
    }
}

/// Options for [`MemoryStore::get`](crate::MemoryStore::get).
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// When set, a missing key yields `Ok(None)` instead of
    /// [`Error::KeyNotFound`].
    pub ignore_not_found: bool,
    /// Minimum resource version the returned object must satisfy; `""` means
    /// no constraint.
    pub resource_version: String,
}

/// Options for list and watch calls.
#[derive(Debug, Clone)]
pub struct ListOptions<O> {
    /// Pivot resource version; `""` and `"0"` mean "any, use current".
    pub resource_version: String,
    /// How the pivot is interpreted; `None` behaves as [`VersionMatch::Exact`].
    pub version_match: Option<VersionMatch>,
    /// Whether the key is a prefix (range) rather than a single object.
    pub recursive: bool,
    /// Server-side filter and pagination.
    pub predicate: SelectionPredicate<O>,
}

impl<O> Default for ListOptions<O> {
    fn default() -> Self {
        Self {
            resource_version: String::new(),
            version_match: None,
            recursive: false,
            predicate: SelectionPredicate::everything(),
        }
    }
}

/// Preconditions evaluated against the current object before delete or update.
#[derive(Debug, Clone, Default)]
pub struct Preconditions {
    /// Required object UID, when set.
    pub uid: Option<String>,
    /// Required current revision, when set.
    pub resource_version: Option<u64>,
}

impl Preconditions {
    /// Checks the current object against these preconditions.
    pub fn check<O: StorageObject>(&self, key: &str, obj: &O) -> Result<()> {
        if let Some(uid) = &self.uid {
            if obj.uid() != uid {
                return Err(Error::PreconditionFailed {
                    key: key.to_string(),
                    reason: format!("uid mismatch: expected {}, got {}", uid, obj.uid()),
                });
            }
        }
        if let Some(required) = self.resource_version {
            let actual = Versioner.object_resource_version(obj)?;
            if actual != required {
                return Err(Error::PreconditionFailed {
                    key: key.to_string(),
                    reason: format!(
                        "resource version mismatch: expected {required}, got {actual}"
                    ),
                });
            }
        }
        Ok(())
    }
}
