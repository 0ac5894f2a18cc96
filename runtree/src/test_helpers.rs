// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{listener::TreeListener, node::OutputSegment, tree::NodeRef};
use std::sync::Mutex;

/// Records every callback as a short string, e.g. `test-started:t1`.
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    calls: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl TreeListener for RecordingListener {
    fn on_testing_started(&self, root: NodeRef<'_>) {
        self.record(format!("testing-started:{}", root.name));
    }

    fn on_testing_finished(&self, root: NodeRef<'_>) {
        self.record(format!("testing-finished:{}", root.name));
    }

    fn on_suite_started(&self, suite: NodeRef<'_>) {
        self.record(format!("suite-started:{}", suite.name));
    }

    fn on_suite_finished(&self, suite: NodeRef<'_>) {
        self.record(format!("suite-finished:{}", suite.name));
    }

    fn on_test_started(&self, test: NodeRef<'_>) {
        self.record(format!("test-started:{}", test.name));
    }

    fn on_test_finished(&self, test: NodeRef<'_>) {
        self.record(format!("test-finished:{}", test.name));
    }

    fn on_test_failed(&self, test: NodeRef<'_>) {
        self.record(format!("test-failed:{}", test.name));
    }

    fn on_test_ignored(&self, test: NodeRef<'_>) {
        self.record(format!("test-ignored:{}", test.name));
    }

    fn on_output(&self, node: NodeRef<'_>, segment: &OutputSegment) {
        self.record(format!("output:{}:{}", node.name, segment.text));
    }

    fn on_tests_count_in_suite(&self, count: usize) {
        self.record(format!("tests-count:{count}"));
    }

    fn on_custom_progress_tests_category(&self, category: Option<&str>, count: usize) {
        self.record(format!(
            "custom-category:{}:{count}",
            category.unwrap_or("-")
        ));
    }

    fn on_custom_progress_test_started(&self) {
        self.record("custom-started".to_owned());
    }

    fn on_custom_progress_test_finished(&self) {
        self.record("custom-finished".to_owned());
    }

    fn on_custom_progress_test_failed(&self) {
        self.record("custom-failed".to_owned());
    }
}
