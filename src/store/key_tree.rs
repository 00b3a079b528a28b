//! Nested key index mapping slash-split key segments to live slots.
//!
//! Each branch node guards its children with its own lock, taken top-down, so
//! independent subtrees mutate without contending. That is the common case:
//! keys are `{group-resource}/{namespace}/{name}` and traffic spreads across
//! namespaces.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::Error;
use crate::errors::Result;
use crate::object::StorageObject;
use crate::store::revision_list::Slot;

enum Node<O> {
    Branch(Arc<Branch<O>>),
    Leaf(Arc<Slot<O>>),
}

impl<O> Clone for Node<O> {
    fn clone(&self) -> Self {
        match self {
            Node::Branch(b) => Node::Branch(Arc::clone(b)),
            Node::Leaf(slot) => Node::Leaf(Arc::clone(slot)),
        }
    }
}

struct Branch<O> {
    children: RwLock<HashMap<String, Node<O>>>,
}

impl<O> Branch<O> {
    fn new() -> Self {
        Self {
            children: RwLock::new(HashMap::new()),
        }
    }
}

/// The key index. A key is uniquely owned by the tree; the slot its leaf
/// points to is the current visible value for that key.
pub(crate) struct KeyTree<O> {
    root: Arc<Branch<O>>,
}

impl<O: StorageObject> KeyTree<O> {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Branch::new()),
        }
    }

    /// Resolves a full segment path to its live slot.
    pub fn get(&self, segments: &[String]) -> Option<Arc<Slot<O>>> {
        let mut node = Arc::clone(&self.root);
        let last = segments.len().checked_sub(1)?;
        for (depth, segment) in segments.iter().enumerate() {
            let child = node.children.read().get(segment).cloned()?;
            match child {
                Node::Branch(branch) => {
                    if depth == last {
                        return None;
                    }
                    node = branch;
                }
                Node::Leaf(slot) => {
                    return if depth == last { Some(slot) } else { None };
                }
            }
        }
        None
    }

    /// Inserts a slot at a key that must not already exist.
    pub fn insert(&self, segments: &[String], slot: Arc<Slot<O>>) -> Result<()> {
        let parent = self.descend_to_parent(segments, slot.key())?;
        let leaf = match segments.last() {
            Some(leaf) => leaf,
            None => return Err(invalid_segments(slot.key())),
        };
        let mut children = parent.children.write();
        match children.get(leaf) {
            None => {
                children.insert(leaf.clone(), Node::Leaf(slot));
                Ok(())
            }
            Some(_) => Err(Error::KeyExists {
                key: slot.key().to_string(),
            }),
        }
    }

    /// Replaces the slot at a key, optionally compare-and-swapping on the
    /// current slot's revision.
    ///
    /// `expected_rev == 0` overwrites unconditionally (the replace paths);
    /// otherwise the current slot must still be at `expected_rev`, so a
    /// racing writer surfaces as a conflict instead of a lost update.
    pub fn put(&self, segments: &[String], slot: Arc<Slot<O>>, expected_rev: u64) -> Result<()> {
        let parent = self.descend_to_parent(segments, slot.key())?;
        let leaf = match segments.last() {
            Some(leaf) => leaf,
            None => return Err(invalid_segments(slot.key())),
        };
        let mut children = parent.children.write();
        match children.get(leaf) {
            Some(Node::Leaf(current)) => {
                if expected_rev != 0 && current.revision() != expected_rev {
                    return Err(Error::PreconditionFailed {
                        key: slot.key().to_string(),
                        reason: format!(
                            "object changed underneath the update: expected revision {expected_rev}, found {}",
                            current.revision()
                        ),
                    });
                }
                children.insert(leaf.clone(), Node::Leaf(slot));
                Ok(())
            }
            Some(Node::Branch(_)) => Err(occupied_by_subtree(slot.key())),
            None => {
                if expected_rev != 0 {
                    return Err(Error::KeyNotFound {
                        key: slot.key().to_string(),
                    });
                }
                children.insert(leaf.clone(), Node::Leaf(slot));
                Ok(())
            }
        }
    }

    /// Removes the leaf at a key, pruning branches it leaves empty.
    pub fn del(&self, segments: &[String], key: &str) -> Result<()> {
        if segments.is_empty() {
            return Err(invalid_segments(key));
        }
        Self::remove_rec(&self.root, segments, key)?;
        Ok(())
    }

    /// Number of live leaves under the segment prefix. An empty prefix counts
    /// the whole tree.
    pub fn count(&self, segments: &[String]) -> u64 {
        let mut node = Arc::clone(&self.root);
        for segment in segments {
            let child = match node.children.read().get(segment).cloned() {
                Some(child) => child,
                None => return 0,
            };
            match child {
                Node::Branch(branch) => node = branch,
                Node::Leaf(_) => return 1,
            }
        }
        Self::count_branch(&node)
    }

    fn count_branch(branch: &Branch<O>) -> u64 {
        branch
            .children
            .read()
            .values()
            .map(|node| match node {
                Node::Leaf(_) => 1,
                Node::Branch(child) => Self::count_branch(child),
            })
            .sum()
    }

    // Walks (and creates) branch nodes down to the leaf's parent.
    fn descend_to_parent(&self, segments: &[String], key: &str) -> Result<Arc<Branch<O>>> {
        if segments.is_empty() {
            return Err(invalid_segments(key));
        }
        let mut node = Arc::clone(&self.root);
        for segment in &segments[..segments.len() - 1] {
            let mut children = node.children.write();
            let child = children
                .entry(segment.clone())
                .or_insert_with(|| Node::Branch(Arc::new(Branch::new())))
                .clone();
            drop(children);
            match child {
                Node::Branch(branch) => node = branch,
                Node::Leaf(_) => return Err(occupied_by_object(key)),
            }
        }
        Ok(node)
    }

    // Holds each parent's write lock while recursing so that pruning an
    // emptied branch cannot race a concurrent insert into it. Locks are only
    // ever taken top-down.
    fn remove_rec(branch: &Branch<O>, segments: &[String], key: &str) -> Result<bool> {
        let mut children = branch.children.write();
        let segment = &segments[0];
        if segments.len() == 1 {
            match children.get(segment) {
                Some(Node::Leaf(_)) => {
                    children.remove(segment);
                }
                _ => {
                    return Err(Error::KeyNotFound {
                        key: key.to_string(),
                    })
                }
            }
        } else {
            let child = match children.get(segment) {
                Some(Node::Branch(child)) => Arc::clone(child),
                _ => {
                    return Err(Error::KeyNotFound {
                        key: key.to_string(),
                    })
                }
            };
            let child_empty = Self::remove_rec(&child, &segments[1..], key)?;
            if child_empty {
                children.remove(segment);
            }
        }
        Ok(children.is_empty())
    }
}

fn invalid_segments(key: &str) -> Error {
    Error::InvalidKey {
        key: key.to_string(),
        reason: "key resolves to no path segments".to_string(),
    }
}

fn occupied_by_subtree(key: &str) -> Error {
    Error::internal(format!("key '{key}' is occupied by a subtree"))
}

fn occupied_by_object(key: &str) -> Error {
    Error::internal(format!("a segment of key '{key}' is occupied by an object"))
}
