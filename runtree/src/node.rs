// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test and suite result nodes.
//!
//! A [`ResultNode`] is owned by a [`ResultTree`](crate::tree::ResultTree) and
//! refers to its parent and children by [`NodeIndex`].

use crate::errors::IllegalTransition;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fmt, time::Duration};

/// The identity of a node as assigned by the event stream.
///
/// The root of a run always has the id [`NodeId::ROOT`]. Ids carried by
/// events are signed so that malformed (negative) ids can be represented and
/// rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    /// The id of the tests root.
    pub const ROOT: Self = Self(0);

    /// Returns true if this id may be assigned to a newly started node.
    ///
    /// Zero is reserved for the root, and negative ids are never valid.
    #[inline]
    pub fn is_valid_child_id(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The position of a node within its owning tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    /// Returns the raw arena position.
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Whether a node is a test or a suite.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// A single test.
    Test,
    /// A grouping of tests and nested suites.
    Suite,
}

impl NodeKind {
    /// Returns a short lowercase name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Suite => "suite",
        }
    }
}

/// The lifecycle state of a node.
///
/// States are ordered: `NotRunning` < `Running` < {`Finished`, `Failed`,
/// `Ignored`}. The three terminal states share a rank, so no terminal state can
/// be reached from another.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    /// Registered, but not started yet.
    NotRunning,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Finished,
    /// Completed with a failure.
    Failed,
    /// Skipped by the test framework.
    Ignored,
}

impl NodeState {
    /// All variants, in rank order.
    pub const ALL_VARIANTS: &'static [Self] = &[
        Self::NotRunning,
        Self::Running,
        Self::Finished,
        Self::Failed,
        Self::Ignored,
    ];

    fn rank(self) -> u8 {
        match self {
            Self::NotRunning => 0,
            Self::Running => 1,
            Self::Finished | Self::Failed | Self::Ignored => 2,
        }
    }

    /// Returns true for `Finished`, `Failed` and `Ignored`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Returns true if a new node may be attached under a node in this state.
    #[inline]
    pub fn accepts_children(self) -> bool {
        matches!(self, Self::NotRunning | Self::Running)
    }

    /// Checks that moving from `from` to `to` goes strictly forward.
    pub fn check_transition(from: Self, to: Self) -> Result<(), IllegalTransition> {
        if to.rank() > from.rank() {
            Ok(())
        } else {
            Err(IllegalTransition { from, to })
        }
    }

    /// Returns a short lowercase name for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRunning => "not-running",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stream a piece of captured output was written to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputChannel {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// Messages produced by the test framework or the runner itself.
    System,
}

/// A contiguous run of output on a single channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OutputSegment {
    /// The channel the text was written to.
    pub channel: OutputChannel,
    /// The text itself.
    pub text: String,
}

/// An expected/actual pair attached to an assertion failure.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Comparison {
    /// The expected value.
    pub expected: String,
    /// The actual value.
    pub actual: String,
    /// A file the expected value was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_file: Option<String>,
    /// A file the actual value was read from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_file: Option<String>,
}

/// Details recorded when a test fails.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FailureDetails {
    /// The failure message.
    pub message: String,
    /// The stack trace, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// An expected/actual comparison, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    /// True if the test errored (e.g. an unexpected exception) rather than
    /// failing an assertion.
    pub is_error: bool,
}

/// A single test or suite result.
#[derive(Clone, Debug)]
pub struct ResultNode {
    /// The id assigned by the event stream. Nodes built from name-only
    /// transports have no id.
    pub id: Option<NodeId>,
    /// The display name.
    pub name: SmolStr,
    /// Test or suite.
    pub kind: NodeKind,
    pub(crate) state: NodeState,
    pub(crate) parent: Option<NodeIndex>,
    pub(crate) children: Vec<NodeIndex>,
    pub(crate) output: Vec<OutputSegment>,
    /// How long the node took, if reported.
    pub duration: Option<Duration>,
    /// Failure details, set when the node fails.
    pub failure: Option<FailureDetails>,
    /// Why the node was ignored, if reported.
    pub ignore_reason: Option<String>,
    /// A location hint, e.g. a source file or a test URL.
    pub location: Option<String>,
    /// A framework-specific node type.
    pub node_type: Option<String>,
    /// Framework-specific arguments for the node type.
    pub node_args: Option<String>,
    pub(crate) started: bool,
    pub(crate) terminated: bool,
    pub(crate) has_errors: bool,
    pub(crate) has_critical_errors: bool,
}

impl ResultNode {
    /// Creates a new node in the `NotRunning` state.
    pub fn new(id: Option<NodeId>, name: impl Into<SmolStr>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            state: NodeState::NotRunning,
            parent: None,
            children: Vec::new(),
            output: Vec::new(),
            duration: None,
            failure: None,
            ignore_reason: None,
            location: None,
            node_type: None,
            node_args: None,
            started: false,
            terminated: false,
            has_errors: false,
            has_critical_errors: false,
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Moves this node to `new`, which must be strictly ahead of the current
    /// state. On error the state is left unchanged.
    pub fn set_state(&mut self, new: NodeState) -> Result<(), IllegalTransition> {
        NodeState::check_transition(self.state, new)?;
        self.state = new;
        Ok(())
    }

    /// Returns the parent, or `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Returns the children in arrival order.
    #[inline]
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Returns true if this node is a suite.
    #[inline]
    pub fn is_suite(&self) -> bool {
        self.kind == NodeKind::Suite
    }

    /// Returns true once the node has been reported as running.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns true if the run ended while this node was still incomplete.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Returns true if an error was reported in this node or below it.
    #[inline]
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Returns true if a critical error was reported against this node.
    #[inline]
    pub fn has_critical_errors(&self) -> bool {
        self.has_critical_errors
    }

    /// Returns all captured output segments in arrival order.
    #[inline]
    pub fn output(&self) -> &[OutputSegment] {
        &self.output
    }

    /// Appends output, merging it into the previous segment if that segment
    /// was written to the same channel.
    pub fn append_output(&mut self, channel: OutputChannel, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.output.last_mut() {
            Some(last) if last.channel == channel => last.text.push_str(text),
            _ => self.output.push(OutputSegment {
                channel,
                text: text.to_owned(),
            }),
        }
    }

    /// Returns all text written to `channel`, concatenated.
    pub fn output_text(&self, channel: OutputChannel) -> String {
        self.output
            .iter()
            .filter(|segment| segment.channel == channel)
            .map(|segment| segment.text.as_str())
            .collect()
    }
}
