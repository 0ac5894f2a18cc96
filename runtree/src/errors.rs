// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by runtree.

use crate::node::{NodeId, NodeState};
use camino::{FromPathBufError, Utf8PathBuf};
use smol_str::SmolStr;
use std::io;
use thiserror::Error;

/// An attempt to move a node's state backwards, or out of a terminal state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("illegal state transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// The state the node was in.
    pub from: NodeState,
    /// The state that was requested.
    pub to: NodeState,
}

/// A structural problem with the event stream.
///
/// These are tolerated (logged and dropped) unless strict mode is enabled.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum Inconsistency {
    /// A started event was received for a node that already exists and cannot
    /// be promoted to running.
    #[error("{event} for node {id} ({name}): node has already been started (state: {state})")]
    AlreadyStarted {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
        /// The state of the existing node.
        state: NodeState,
    },

    /// A started event did not carry a parent id.
    #[error("{event} for node {id} ({name}): parent node id should be defined")]
    MissingParentId {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
    },

    /// A started event referred to a parent that is not registered.
    #[error("{event} for node {id} ({name}): parent node {parent_id} is undefined")]
    UnknownParent {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
        /// The parent id carried by the event.
        parent_id: NodeId,
    },

    /// A started event referred to a parent that has already completed.
    #[error(
        "{event} for node {id} ({name}): parent node {parent_id} should be registered \
         or running (state: {parent_state})"
    )]
    ParentNotActive {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
        /// The parent id carried by the event.
        parent_id: NodeId,
        /// The state of the parent.
        parent_state: NodeState,
    },

    /// A running start would place the node under an ancestor that has
    /// already completed.
    #[error(
        "{event} for node {id} ({name}): ancestor `{ancestor}` has already completed \
         (state: {ancestor_state})"
    )]
    AncestorCompleted {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
        /// The name of the completed ancestor.
        ancestor: SmolStr,
        /// The state of the completed ancestor.
        ancestor_state: NodeState,
    },

    /// A started event carried an id that cannot be assigned to a new node.
    #[error("{event} for node {id} ({name}): node id must be positive")]
    InvalidNodeId {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The name carried by the event.
        name: SmolStr,
    },

    /// A finishing event referred to a node that was never opened.
    #[error("{event} for node {id}: closing a node that was never opened")]
    NeverOpened {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
    },

    /// A finishing event targeted the tests root, which only run completion
    /// may close.
    #[error("{event} for the tests root: the root is closed when the run completes")]
    RootFinished {
        /// The event kind.
        event: &'static str,
    },

    /// An output event referred to a node that is not registered.
    #[error("output for node {id}: no such node")]
    UnknownOutputTarget {
        /// The node id.
        id: NodeId,
    },

    /// `TestingStarted` was received more than once.
    #[error("testing has already been started")]
    TestingAlreadyStarted,

    /// An event was received after the convertor was disposed.
    #[error("{event} received after the run was disposed")]
    AfterDispose {
        /// The event kind.
        event: &'static str,
    },
}

/// An error returned while applying an event to the tree.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConvertError {
    /// A stream inconsistency, raised only in strict mode.
    #[error("event stream inconsistency")]
    Inconsistency(#[from] Inconsistency),

    /// A node's state would have moved backwards. Raised in every mode.
    #[error("{event} for node {id} rejected")]
    IllegalTransition {
        /// The event kind.
        event: &'static str,
        /// The node id.
        id: NodeId,
        /// The rejected transition.
        #[source]
        source: IllegalTransition,
    },
}

/// An error returned by [`SuiteStack::pop_suite`](crate::stack::SuiteStack::pop_suite)
/// in strict mode.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StackError {
    /// The suite on top of the stack is not the one being closed.
    #[error("suite stack mismatch: expected to close `{expected}`, but the current suite is `{current}`")]
    Mismatch {
        /// The name passed to `pop_suite`.
        expected: SmolStr,
        /// The name of the suite on top of the stack.
        current: SmolStr,
    },
}

/// An error returned by [`NamedTreeBuilder`](crate::named::NamedTreeBuilder).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum NamedTreeError {
    /// A test was closed without being started.
    #[error("{event} for test `{name}`: test was never started")]
    TestNotStarted {
        /// The event kind.
        event: &'static str,
        /// The test name.
        name: SmolStr,
    },

    /// A test with the same name is already running.
    #[error("test `{name}` started while a test with the same name is still running")]
    DuplicateRunningTest {
        /// The test name.
        name: SmolStr,
    },

    /// An event arrived after the run was finished. Raised only in strict
    /// mode.
    #[error("{event} received after the run finished")]
    AfterFinish {
        /// The event kind.
        event: &'static str,
    },

    /// The suite stack rejected a close event.
    #[error("failed to close suite")]
    Stack(#[from] StackError),

    /// A node's state would have moved backwards.
    #[error("{event} for `{name}` rejected")]
    IllegalTransition {
        /// The event kind.
        event: &'static str,
        /// The node name.
        name: SmolStr,
        /// The rejected transition.
        #[source]
        source: IllegalTransition,
    },
}

/// An error that occurred while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file at `{path}`")]
    Read {
        /// The path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The config file could not be parsed.
    #[error("failed to parse config file at `{path}`")]
    Parse {
        /// The path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// An explicitly specified config file does not exist.
    #[error("config file not found at `{path}`")]
    FileNotFound {
        /// The path.
        path: Utf8PathBuf,
    },

    /// The config directory is not valid UTF-8.
    #[error("config directory is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        error: FromPathBufError,
    },
}

/// An error returned by [`WorkerHandle`](crate::worker::WorkerHandle).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum WorkerError {
    /// The worker task is no longer accepting requests.
    #[error("event worker has shut down")]
    Closed,

    /// The worker task panicked.
    #[error("event worker panicked")]
    Panicked,
}
