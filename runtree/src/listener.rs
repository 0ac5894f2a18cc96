// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observers notified as the result tree evolves.
//!
//! Listeners are held in a [`ListenerRegistry`], which can be shared across
//! threads. Registration and removal may happen while a broadcast is in
//! progress: each broadcast works from a snapshot of the listener list taken
//! when it started.

use crate::{node::OutputSegment, tree::NodeRef};
use debug_ignore::DebugIgnore;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::error;

/// Callbacks invoked by the convertor as it applies events.
///
/// All methods have empty default implementations. Callbacks run on the
/// thread applying events and must not block indefinitely.
#[allow(unused_variables)]
pub trait TreeListener: Send + Sync {
    /// The run started.
    fn on_testing_started(&self, root: NodeRef<'_>) {}

    /// The run finished or was terminated. Called exactly once per run.
    fn on_testing_finished(&self, root: NodeRef<'_>) {}

    /// A suite transitioned to running.
    fn on_suite_started(&self, suite: NodeRef<'_>) {}

    /// A suite completed.
    fn on_suite_finished(&self, suite: NodeRef<'_>) {}

    /// A test transitioned to running.
    fn on_test_started(&self, test: NodeRef<'_>) {}

    /// A test completed successfully.
    fn on_test_finished(&self, test: NodeRef<'_>) {}

    /// A test failed.
    fn on_test_failed(&self, test: NodeRef<'_>) {}

    /// A test was ignored.
    fn on_test_ignored(&self, test: NodeRef<'_>) {}

    /// Output was attributed to a node.
    fn on_output(&self, node: NodeRef<'_>, segment: &OutputSegment) {}

    /// A suite announced the number of tests it is about to run.
    fn on_tests_count_in_suite(&self, count: usize) {}

    /// A custom progress category was announced.
    fn on_custom_progress_tests_category(&self, category: Option<&str>, count: usize) {}

    /// An item in the custom progress category started.
    fn on_custom_progress_test_started(&self) {}

    /// An item in the custom progress category finished.
    fn on_custom_progress_test_finished(&self) {}

    /// An item in the custom progress category failed.
    fn on_custom_progress_test_failed(&self) {}
}

/// Identifies a registered listener so that it can be removed later.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Debug)]
struct Entry {
    id: ListenerId,
    listener: DebugIgnore<Arc<dyn TreeListener>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    entries: RwLock<Arc<[Entry]>>,
}

/// A shared, copy-on-write list of listeners.
///
/// Cloning the registry produces another handle to the same list.
#[derive(Clone, Debug, Default)]
pub struct ListenerRegistry {
    inner: Arc<Inner>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. It receives every broadcast started after this
    /// call returns.
    pub fn add(&self, listener: Arc<dyn TreeListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Entry> = entries.iter().cloned().collect();
        next.push(Entry {
            id,
            listener: DebugIgnore(listener),
        });
        *entries = next.into();
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    ///
    /// A broadcast already in progress still delivers to the removed listener.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !entries.iter().any(|entry| entry.id == id) {
            return false;
        }
        let next: Vec<Entry> = entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        *entries = next.into();
        true
    }

    /// Removes every listener.
    pub fn clear(&self) {
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *entries = Vec::new().into();
    }

    /// Returns the number of registered listeners.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns true if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Returns the listeners registered right now.
    pub fn snapshot(&self) -> Vec<Arc<dyn TreeListener>> {
        self.entries()
            .iter()
            .map(|entry| Arc::clone(&*entry.listener))
            .collect()
    }

    fn entries(&self) -> Arc<[Entry]> {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*entries)
    }

    /// Delivers a callback to every listener registered when the broadcast
    /// starts.
    ///
    /// A listener that panics is logged and skipped; the remaining listeners
    /// still receive the callback.
    pub fn broadcast(&self, callback: &'static str, f: impl Fn(&dyn TreeListener)) {
        let entries = self.entries();
        for entry in entries.iter() {
            let listener: &dyn TreeListener = &**entry.listener;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(listener))) {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("(non-string panic payload)");
                error!(
                    listener = ?entry.id,
                    "listener panicked in {callback}, continuing with remaining listeners: {message}"
                );
            }
        }
    }
}
