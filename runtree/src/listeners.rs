// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listeners bundled with runtree.

use crate::{listener::TreeListener, tree::NodeRef};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Progress counters maintained from listener callbacks.
///
/// Register an `Arc<RunStats>` with a
/// [`ListenerRegistry`](crate::listener::ListenerRegistry) and read it with
/// [`summary`](Self::summary) at any time, from any thread.
#[derive(Debug, Default)]
pub struct RunStats {
    tests_started: AtomicUsize,
    tests_passed: AtomicUsize,
    tests_failed: AtomicUsize,
    tests_ignored: AtomicUsize,
    tests_interrupted: AtomicUsize,
    suites_started: AtomicUsize,
    suites_finished: AtomicUsize,
    declared_tests: AtomicUsize,
    custom_started: AtomicUsize,
    custom_finished: AtomicUsize,
    custom_failed: AtomicUsize,
    testing_finished: AtomicBool,
}

impl RunStats {
    /// Creates a set of zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current values of the counters.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            tests_started: self.tests_started.load(Ordering::Relaxed),
            tests_passed: self.tests_passed.load(Ordering::Relaxed),
            tests_failed: self.tests_failed.load(Ordering::Relaxed),
            tests_ignored: self.tests_ignored.load(Ordering::Relaxed),
            tests_interrupted: self.tests_interrupted.load(Ordering::Relaxed),
            suites_started: self.suites_started.load(Ordering::Relaxed),
            suites_finished: self.suites_finished.load(Ordering::Relaxed),
            declared_tests: self.declared_tests.load(Ordering::Relaxed),
            custom_started: self.custom_started.load(Ordering::Relaxed),
            custom_finished: self.custom_finished.load(Ordering::Relaxed),
            custom_failed: self.custom_failed.load(Ordering::Relaxed),
            testing_finished: self.testing_finished.load(Ordering::Acquire),
        }
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl TreeListener for RunStats {
    fn on_testing_finished(&self, _root: NodeRef<'_>) {
        self.testing_finished.store(true, Ordering::Release);
    }

    fn on_suite_started(&self, _suite: NodeRef<'_>) {
        bump(&self.suites_started);
    }

    fn on_suite_finished(&self, _suite: NodeRef<'_>) {
        bump(&self.suites_finished);
    }

    fn on_test_started(&self, _test: NodeRef<'_>) {
        bump(&self.tests_started);
    }

    fn on_test_finished(&self, test: NodeRef<'_>) {
        if test.is_terminated() {
            bump(&self.tests_interrupted);
        } else {
            bump(&self.tests_passed);
        }
    }

    fn on_test_failed(&self, _test: NodeRef<'_>) {
        bump(&self.tests_failed);
    }

    fn on_test_ignored(&self, _test: NodeRef<'_>) {
        bump(&self.tests_ignored);
    }

    fn on_tests_count_in_suite(&self, count: usize) {
        self.declared_tests.fetch_add(count, Ordering::Relaxed);
    }

    fn on_custom_progress_test_started(&self) {
        bump(&self.custom_started);
    }

    fn on_custom_progress_test_finished(&self) {
        bump(&self.custom_finished);
    }

    fn on_custom_progress_test_failed(&self) {
        bump(&self.custom_failed);
    }
}

/// A point-in-time copy of [`RunStats`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatsSummary {
    /// Tests that started running.
    pub tests_started: usize,
    /// Tests that finished successfully.
    pub tests_passed: usize,
    /// Tests that failed.
    pub tests_failed: usize,
    /// Tests that were ignored.
    pub tests_ignored: usize,
    /// Tests closed as terminated because an enclosing suite finished first.
    pub tests_interrupted: usize,
    /// Suites that started running.
    pub suites_started: usize,
    /// Suites that finished.
    pub suites_finished: usize,
    /// The sum of all declared suite sizes.
    pub declared_tests: usize,
    /// Custom progress: tests started.
    pub custom_started: usize,
    /// Custom progress: tests finished.
    pub custom_finished: usize,
    /// Custom progress: tests failed.
    pub custom_failed: usize,
    /// True once the run has completed.
    pub testing_finished: bool,
}

impl StatsSummary {
    /// Returns the number of tests that reached a terminal state.
    pub fn tests_completed(&self) -> usize {
        self.tests_passed + self.tests_failed + self.tests_ignored + self.tests_interrupted
    }
}
