// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracking of running tests, used to attribute output that arrives without a
//! target node.

use crate::node::NodeIndex;
use indexmap::IndexSet;

/// The set of leaf tests currently running, in the order they started.
///
/// When output or an error arrives without an explicit node, it is attributed
/// to the [active node](Self::active_node). This is a heuristic: with several
/// tests executing concurrently there is no way to know which one produced
/// the text.
#[derive(Clone, Debug, Default)]
pub struct RunningTests {
    tests: IndexSet<NodeIndex>,
}

impl RunningTests {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a test as running. Returns false if it already was.
    pub fn insert(&mut self, test: NodeIndex) -> bool {
        self.tests.insert(test)
    }

    /// Records a test as no longer running. Returns false if it was not
    /// running.
    pub fn remove(&mut self, test: NodeIndex) -> bool {
        // shift_remove keeps the start order of the remaining tests intact.
        self.tests.shift_remove(&test)
    }

    /// Returns true if `test` is running.
    pub fn contains(&self, test: NodeIndex) -> bool {
        self.tests.contains(&test)
    }

    /// Returns the number of running tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if no tests are running.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Forgets every running test.
    pub fn clear(&mut self) {
        self.tests.clear();
    }

    /// Iterates over running tests in start order.
    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.tests.iter().copied()
    }

    /// Returns the node unattributed output should go to: the most recently
    /// started test that is still running, or `root` if none is.
    pub fn active_node(&self, root: NodeIndex) -> NodeIndex {
        self.tests.last().copied().unwrap_or(root)
    }
}
