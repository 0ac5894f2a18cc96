// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed lifecycle events consumed by the convertor.
//!
//! Events are delivered already deserialized. The serde representation is the
//! one used by recorded event logs: one JSON object per line, tagged by an
//! `event` field.

use crate::node::{Comparison, NodeId, OutputChannel};
use serde::Deserialize;
use smol_str::SmolStr;
use std::time::Duration;

/// A lifecycle event for an id-based transport.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum TreeEvent {
    /// The run started.
    TestingStarted,
    /// The run finished. Anything not closed by now is considered aborted.
    TestingFinished,
    /// A suite was registered or started.
    SuiteStarted(StartedNode),
    /// A suite completed.
    SuiteFinished(FinishedNode),
    /// A test was registered or started.
    TestStarted(StartedNode),
    /// A test completed successfully.
    TestFinished(FinishedNode),
    /// A test failed.
    TestFailed(FailedNode),
    /// A test was ignored.
    TestIgnored(IgnoredNode),
    /// Output captured from a test or suite.
    TestOutput(NodeOutput),
    /// Output that could not be associated with a node by the transport.
    UncapturedOutput {
        /// The text.
        text: String,
        /// The channel it was written to.
        #[serde(default)]
        channel: OutputChannel,
    },
    /// An error reported by the test framework or the remote runner.
    Error {
        /// The error message.
        message: String,
        /// A stack trace, if available.
        #[serde(default)]
        stack_trace: Option<String>,
        /// True if the error prevents the run from producing valid results.
        #[serde(default)]
        critical: bool,
    },
    /// The number of tests a suite is about to run.
    TestsCountInSuite {
        /// The number of tests.
        count: usize,
    },
    /// A custom progress category was announced.
    CustomProgressTestsCategory {
        /// The category name, or `None` to reset to the default category.
        #[serde(default)]
        category: Option<String>,
        /// The number of items in the category.
        #[serde(default)]
        count: usize,
    },
    /// An item in the custom progress category started.
    CustomProgressTestStarted,
    /// An item in the custom progress category finished.
    CustomProgressTestFinished,
    /// An item in the custom progress category failed.
    CustomProgressTestFailed,
}

impl TreeEvent {
    /// Returns the name of this event kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TestingStarted => "testing-started",
            Self::TestingFinished => "testing-finished",
            Self::SuiteStarted(_) => "suite-started",
            Self::SuiteFinished(_) => "suite-finished",
            Self::TestStarted(_) => "test-started",
            Self::TestFinished(_) => "test-finished",
            Self::TestFailed(_) => "test-failed",
            Self::TestIgnored(_) => "test-ignored",
            Self::TestOutput(_) => "test-output",
            Self::UncapturedOutput { .. } => "uncaptured-output",
            Self::Error { .. } => "error",
            Self::TestsCountInSuite { .. } => "tests-count-in-suite",
            Self::CustomProgressTestsCategory { .. } => "custom-progress-tests-category",
            Self::CustomProgressTestStarted => "custom-progress-test-started",
            Self::CustomProgressTestFinished => "custom-progress-test-finished",
            Self::CustomProgressTestFailed => "custom-progress-test-failed",
        }
    }
}

fn default_running() -> bool {
    true
}

/// Payload for [`TreeEvent::SuiteStarted`] and [`TreeEvent::TestStarted`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StartedNode {
    /// The node id. Must be positive.
    pub id: NodeId,
    /// The parent id. Must refer to a registered node that has not completed.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// The display name.
    pub name: SmolStr,
    /// False if the node is only being registered, e.g. while the runner
    /// announces the tree before executing it.
    #[serde(default = "default_running")]
    pub running: bool,
    /// A location hint.
    #[serde(default)]
    pub location: Option<String>,
    /// A framework-specific node type.
    #[serde(default)]
    pub node_type: Option<String>,
    /// Framework-specific arguments for the node type.
    #[serde(default)]
    pub node_args: Option<String>,
}

impl StartedNode {
    /// Creates a running node payload with the given ids and name.
    pub fn new(id: i64, parent_id: i64, name: impl Into<SmolStr>) -> Self {
        Self {
            id: NodeId(id),
            parent_id: Some(NodeId(parent_id)),
            name: name.into(),
            running: true,
            location: None,
            node_type: None,
            node_args: None,
        }
    }

    /// Marks the node as registered but not running yet.
    pub fn not_running(mut self) -> Self {
        self.running = false;
        self
    }
}

/// Payload for [`TreeEvent::SuiteFinished`] and [`TreeEvent::TestFinished`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FinishedNode {
    /// The node id.
    pub id: NodeId,
    /// How long the node took.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
}

impl FinishedNode {
    /// Creates a payload without a duration.
    pub fn new(id: i64) -> Self {
        Self {
            id: NodeId(id),
            duration: None,
        }
    }
}

/// Payload for [`TreeEvent::TestFailed`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailedNode {
    /// The node id.
    pub id: NodeId,
    /// The failure message.
    #[serde(default)]
    pub message: String,
    /// A stack trace, if available.
    #[serde(default)]
    pub stack_trace: Option<String>,
    /// An expected/actual comparison, if available.
    #[serde(default)]
    pub comparison: Option<Comparison>,
    /// True if the test errored rather than failing an assertion.
    #[serde(default)]
    pub is_error: bool,
    /// How long the test took.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
}

impl FailedNode {
    /// Creates a payload with just a message.
    pub fn new(id: i64, message: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            message: message.into(),
            stack_trace: None,
            comparison: None,
            is_error: false,
            duration: None,
        }
    }
}

/// Payload for [`TreeEvent::TestIgnored`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IgnoredNode {
    /// The node id.
    pub id: NodeId,
    /// Why the test was ignored.
    #[serde(default)]
    pub reason: Option<String>,
    /// A stack trace, if available.
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Payload for [`TreeEvent::TestOutput`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeOutput {
    /// The node the output belongs to. If absent, the output is attributed to
    /// the currently active node.
    #[serde(default)]
    pub id: Option<NodeId>,
    /// The text.
    pub text: String,
    /// The channel it was written to.
    #[serde(default)]
    pub channel: OutputChannel,
}

/// A lifecycle event for a name-only transport.
///
/// Suites and tests are identified by name; nesting is implied by the order of
/// suite start and finish events.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum NamedEvent {
    /// The run started.
    TestingStarted,
    /// The run finished.
    TestingFinished,
    /// A suite started inside the current suite.
    SuiteStarted {
        /// The suite name.
        name: SmolStr,
        /// A location hint.
        #[serde(default)]
        location: Option<String>,
    },
    /// A suite finished.
    SuiteFinished {
        /// The suite name.
        name: SmolStr,
    },
    /// A test started inside the current suite.
    TestStarted {
        /// The test name.
        name: SmolStr,
        /// A location hint.
        #[serde(default)]
        location: Option<String>,
    },
    /// A test completed successfully.
    TestFinished {
        /// The test name.
        name: SmolStr,
        /// How long the test took.
        #[serde(default, with = "humantime_serde")]
        duration: Option<Duration>,
    },
    /// A test failed.
    TestFailed {
        /// The test name.
        name: SmolStr,
        /// The failure message.
        #[serde(default)]
        message: String,
        /// A stack trace, if available.
        #[serde(default)]
        stack_trace: Option<String>,
        /// True if the test errored rather than failing an assertion.
        #[serde(default)]
        is_error: bool,
    },
    /// A test was ignored.
    TestIgnored {
        /// The test name.
        name: SmolStr,
        /// Why the test was ignored.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Output captured from a running test.
    TestOutput {
        /// The test name. If absent or not running, the output goes to the
        /// active node.
        #[serde(default)]
        name: Option<SmolStr>,
        /// The text.
        text: String,
        /// The channel it was written to.
        #[serde(default)]
        channel: OutputChannel,
    },
    /// Output that could not be associated with a test by the transport.
    UncapturedOutput {
        /// The text.
        text: String,
        /// The channel it was written to.
        #[serde(default)]
        channel: OutputChannel,
    },
}

impl NamedEvent {
    /// Returns the name of this event kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TestingStarted => "testing-started",
            Self::TestingFinished => "testing-finished",
            Self::SuiteStarted { .. } => "suite-started",
            Self::SuiteFinished { .. } => "suite-finished",
            Self::TestStarted { .. } => "test-started",
            Self::TestFinished { .. } => "test-finished",
            Self::TestFailed { .. } => "test-failed",
            Self::TestIgnored { .. } => "test-ignored",
            Self::TestOutput { .. } => "test-output",
            Self::UncapturedOutput { .. } => "uncaptured-output",
        }
    }
}
