// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup from event ids to tree nodes.

use crate::node::{NodeId, NodeIndex};
use std::collections::HashMap;

/// Maps each [`NodeId`] seen in the current run to its position in the tree.
///
/// The registry does not own nodes: the tree does, through its parent/child
/// links. Clearing the registry only forgets the ids.
#[derive(Clone, Debug, Default)]
pub struct NodeRegistry {
    by_id: HashMap<NodeId, NodeIndex>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a node by id.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<NodeIndex> {
        self.by_id.get(&id).copied()
    }

    /// Returns true if `id` is registered.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Registers `index` under `id`.
    ///
    /// Ids are never reused within a run, so an existing mapping is left in
    /// place and returned as the error.
    pub fn put(&mut self, id: NodeId, index: NodeIndex) -> Result<(), NodeIndex> {
        match self.by_id.entry(id) {
            std::collections::hash_map::Entry::Occupied(entry) => Err(*entry.get()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(index);
                Ok(())
            }
        }
    }

    /// Forgets every mapping.
    pub fn remove_all(&mut self) {
        self.by_id.clear();
    }

    /// Returns the number of registered ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if no ids are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
