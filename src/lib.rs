//! # revstore
//!
//! Revision-ordered, in-memory object store with streaming watch — the
//! persistence layer behind a declarative API server, offering the contract
//! of an etcd-backed store minus disk durability.
//!
//! Clients submit typed, versioned objects addressed by hierarchical string
//! keys. The store assigns a strictly monotonic revision to every mutation,
//! keeps the live set indexed by key *and* by revision, and fans mutation
//! events out to any number of long-lived watchers filtered by key prefix and
//! starting revision.
//!
//! ## What this crate provides
//!
//! - **CRUD with optimistic concurrency** — [`MemoryStore::create`],
//!   [`MemoryStore::delete`], [`MemoryStore::get`], and
//!   [`MemoryStore::guaranteed_update`] with precondition checks and a
//!   caller-supplied mutator closure.
//! - **Paginated range listing** — [`MemoryStore::get_list`] with a continue
//!   token that survives intervening mutations and precise resource-version
//!   match rules.
//! - **Streaming watch** — [`MemoryStore::watch`] replays state from a
//!   starting revision, then tails live mutations in strict revision order.
//!
//! Object schema, selector parsing, and the REST surface are the embedding
//! server's business: the store sees objects only through the
//! [`StorageObject`] capability and filters only through
//! [`SelectionPredicate`] closures.
//!
//! ## Example
//!
//! ```ignore
//! use revstore::{GetOptions, MemoryStore, StoreConfig};
//!
//! let store: MemoryStore<MyObject> = MemoryStore::new(StoreConfig::default())?;
//! store.start();
//!
//! let created = store.create("/apps/default/web", &my_object)?;
//! let fetched = store.get("/apps/default/web", &GetOptions::default())?;
//!
//! let mut watch = store.watch("/apps/default/", &watch_opts)?;
//! while let Some(event) = watch.recv().await {
//!     println!("{:?}", event?);
//! }
//! ```
//!
//! ## Concurrency model
//!
//! Readers and writers run in parallel. Writers serialize only on the
//! revision allocator, for the instant it takes to couple "next revision"
//! with "next list slot". A global quiesce lock is held for read by every
//! operation and for write only by [`MemoryStore::stop`] and the periodic
//! shrink pass, which is what lets shrink rewrite slot indexes safely.
//!
//! Stored objects are deep-copied on every entry and exit boundary; a value
//! returned to one caller can never observe a later mutation.

mod config;
mod continuation;
mod errors;
mod object;
mod options;
mod selection;
mod store;
mod watch;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::StoreConfig;
pub use continuation::decode_continue;
pub use continuation::encode_continue;
pub use errors::Error;
pub use errors::Result;
pub use object::StorageObject;
pub use object::Versioner;
pub use options::GetOptions;
pub use options::ListOptions;
pub use options::Preconditions;
pub use options::VersionMatch;
pub use selection::FilterFn;
pub use selection::SelectionPredicate;
pub use store::MemoryStore;
pub use store::ObjectList;
pub use watch::Event;
pub use watch::EventKind;
pub use watch::WatchHandle;
