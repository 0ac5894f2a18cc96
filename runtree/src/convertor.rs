// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event-to-tree convertor.
//!
//! [`EventConvertor`] applies [`TreeEvent`]s, one at a time and in arrival
//! order, to a [`ResultTree`]. It is not safe to feed a convertor from several
//! producers at once; see [`worker`](crate::worker) for a single-consumer
//! event loop around it.
//!
//! The rules, for a started event:
//!
//! 1. If the node already exists, it is promoted to running if it is
//!    `NotRunning` and the event reports it as running. Anything else is a
//!    duplicate start.
//! 2. Otherwise the parent must be registered and `NotRunning` or `Running`.
//! 3. The node's own id must be positive.
//! 4. The node is attached as the last child of its parent and, if running,
//!    it and its not-yet-running ancestors become `Running`.
//!
//! A finishing event moves its node to a terminal state. Structural problems
//! with the stream are inconsistencies: they are logged and the event dropped,
//! unless [strict mode](ConvertorConfig::strict) is on. Moving a node's state
//! backwards is always an error.

use crate::{
    config::ConvertorConfig,
    errors::{ConvertError, Inconsistency},
    events::{FailedNode, FinishedNode, IgnoredNode, NodeOutput, StartedNode, TreeEvent},
    listener::{ListenerRegistry, TreeListener},
    node::{FailureDetails, NodeId, NodeIndex, NodeKind, NodeState, OutputChannel, OutputSegment, ResultNode},
    output::RunningTests,
    registry::NodeRegistry,
    tree::{NodeRef, ResultTree, RunOutcome},
};
use smol_str::SmolStr;
use tracing::{debug, error, warn};

/// Applies lifecycle events to a result tree and notifies listeners.
#[derive(Debug)]
pub struct EventConvertor {
    config: ConvertorConfig,
    tree: ResultTree,
    registry: NodeRegistry,
    running: RunningTests,
    listeners: ListenerRegistry,
    testing_finished: bool,
    disposed: bool,
}

impl EventConvertor {
    /// Creates a convertor with a fresh tree whose root is registered under
    /// [`NodeId::ROOT`].
    pub fn new(config: ConvertorConfig, listeners: ListenerRegistry) -> Self {
        Self::with_root_name(config, listeners, ResultTree::DEFAULT_ROOT_NAME)
    }

    /// Creates a convertor whose root node has the given name.
    pub fn with_root_name(
        config: ConvertorConfig,
        listeners: ListenerRegistry,
        root_name: impl Into<SmolStr>,
    ) -> Self {
        let tree = ResultTree::new(root_name);
        let mut registry = NodeRegistry::new();
        let registered = registry.put(NodeId::ROOT, tree.root());
        debug_assert!(registered.is_ok(), "a fresh registry is empty");
        Self {
            config,
            tree,
            registry,
            running: RunningTests::new(),
            listeners,
            testing_finished: false,
            disposed: false,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> ConvertorConfig {
        self.config
    }

    /// Returns the listener registry this convertor broadcasts to.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Returns the tree built so far.
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Returns a copy of the tree built so far.
    pub fn snapshot(&self) -> ResultTree {
        self.tree.clone()
    }

    /// Consumes the convertor, returning the tree.
    pub fn into_tree(self) -> ResultTree {
        self.tree
    }

    /// Returns the node registered under `id` in the current run.
    pub fn node_by_id(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.registry.get(id).map(|index| self.tree.node_ref(index))
    }

    /// Returns the tests currently running.
    pub fn running_tests(&self) -> &RunningTests {
        &self.running
    }

    /// Returns true once run completion has been processed.
    pub fn is_testing_finished(&self) -> bool {
        self.testing_finished
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Applies a single event.
    ///
    /// Inconsistencies are returned as errors only in strict mode; otherwise
    /// they are logged and the event is dropped. Illegal state transitions
    /// are returned in every mode.
    pub fn apply(&mut self, event: TreeEvent) -> Result<(), ConvertError> {
        let event_name = event.kind_name();
        if self.disposed {
            return self.inconsistency(Inconsistency::AfterDispose { event: event_name });
        }
        debug!(event = event_name, "applying event");

        match event {
            TreeEvent::TestingStarted => self.start_testing(),
            TreeEvent::TestingFinished => {
                self.finish_testing();
                Ok(())
            }
            TreeEvent::SuiteStarted(started) => {
                self.start_node(event_name, NodeKind::Suite, started)
            }
            TreeEvent::TestStarted(started) => self.start_node(event_name, NodeKind::Test, started),
            TreeEvent::SuiteFinished(FinishedNode { id, duration }) => {
                self.finish_node(event_name, id, NodeState::Finished, |node| {
                    if duration.is_some() {
                        node.duration = duration;
                    }
                })
            }
            TreeEvent::TestFinished(FinishedNode { id, duration }) => {
                self.finish_node(event_name, id, NodeState::Finished, |node| {
                    if duration.is_some() {
                        node.duration = duration;
                    }
                })
            }
            TreeEvent::TestFailed(failed) => self.fail_test(event_name, failed),
            TreeEvent::TestIgnored(ignored) => self.ignore_test(event_name, ignored),
            TreeEvent::TestOutput(output) => self.node_output(output),
            TreeEvent::UncapturedOutput { text, channel } => {
                let active = self.active_node();
                self.append_output(active, channel, text);
                Ok(())
            }
            TreeEvent::Error {
                message,
                stack_trace,
                critical,
            } => {
                self.add_error(message, stack_trace, critical);
                Ok(())
            }
            TreeEvent::TestsCountInSuite { count } => {
                self.listeners
                    .broadcast("on_tests_count_in_suite", |l| {
                        l.on_tests_count_in_suite(count)
                    });
                Ok(())
            }
            TreeEvent::CustomProgressTestsCategory { category, count } => {
                self.listeners
                    .broadcast("on_custom_progress_tests_category", |l| {
                        l.on_custom_progress_tests_category(category.as_deref(), count)
                    });
                Ok(())
            }
            TreeEvent::CustomProgressTestStarted => {
                self.listeners
                    .broadcast("on_custom_progress_test_started", |l| {
                        l.on_custom_progress_test_started()
                    });
                Ok(())
            }
            TreeEvent::CustomProgressTestFinished => {
                self.listeners
                    .broadcast("on_custom_progress_test_finished", |l| {
                        l.on_custom_progress_test_finished()
                    });
                Ok(())
            }
            TreeEvent::CustomProgressTestFailed => {
                self.listeners
                    .broadcast("on_custom_progress_test_failed", |l| {
                        l.on_custom_progress_test_failed()
                    });
                Ok(())
            }
        }
    }

    /// Completes the run.
    ///
    /// The run is finished if no tests are running and every top-level node
    /// reached a terminal state; otherwise the root is marked terminated.
    /// Per-run state is then cleared and listeners are told the run is over.
    /// Calling this more than once has no further effect.
    pub fn finish_testing(&mut self) {
        if self.testing_finished {
            debug!("testing already finished, ignoring");
            return;
        }
        self.testing_finished = true;

        let root = self.tree.root();
        if self.is_tree_complete() {
            if let Err(error) = self.tree.node_mut(root).set_state(NodeState::Finished) {
                error!("failed to finish the tests root: {error}");
            }
            self.tree.set_outcome(RunOutcome::Finished);
        } else {
            self.tree.node_mut(root).terminated = true;
            self.tree.set_outcome(RunOutcome::Terminated);
        }

        if !self.running.is_empty() {
            warn!(
                "not all events were processed: {} test(s) still running at the end of the run",
                self.running.len()
            );
        }
        self.running.clear();
        self.registry.remove_all();

        self.notify("on_testing_finished", root, |l, node| {
            l.on_testing_finished(node)
        });
    }

    /// Tears down the run: clears per-run state and detaches all listeners.
    ///
    /// The tree remains readable. Events applied afterwards are
    /// inconsistencies. Calling this more than once has no further effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if !self.running.is_empty() {
            warn!(
                "disposing while {} test(s) are still running: the run was terminated abruptly",
                self.running.len()
            );
        }
        self.running.clear();
        self.registry.remove_all();
        self.listeners.clear();
    }

    // ---
    // Event handlers
    // ---

    fn start_testing(&mut self) -> Result<(), ConvertError> {
        let root = self.tree.root();
        let node = self.tree.node_mut(root);
        if node.state != NodeState::NotRunning {
            return self.inconsistency(Inconsistency::TestingAlreadyStarted);
        }
        node.state = NodeState::Running;
        node.started = true;

        self.notify("on_testing_started", root, |l, node| {
            l.on_testing_started(node)
        });
        Ok(())
    }

    fn start_node(
        &mut self,
        event_name: &'static str,
        kind: NodeKind,
        started: StartedNode,
    ) -> Result<(), ConvertError> {
        if let Some(existing) = self.registry.get(started.id) {
            if existing == self.tree.root() {
                return self.inconsistency(Inconsistency::InvalidNodeId {
                    event: event_name,
                    id: started.id,
                    name: started.name,
                });
            }
            let state = self.tree.node(existing).state;
            if state == NodeState::NotRunning && started.running {
                if let Some(parent) = self.tree.node(existing).parent
                    && !self.check_ancestors_open(event_name, &started, parent)?
                {
                    return Ok(());
                }
                self.set_node_and_ancestors_running(existing);
                return Ok(());
            }
            return self.inconsistency(Inconsistency::AlreadyStarted {
                event: event_name,
                id: started.id,
                name: started.name,
                state,
            });
        }

        let Some(parent) = self.find_valid_parent(event_name, &started)? else {
            return Ok(());
        };

        if !started.id.is_valid_child_id() {
            return self.inconsistency(Inconsistency::InvalidNodeId {
                event: event_name,
                id: started.id,
                name: started.name,
            });
        }

        if started.running && !self.check_ancestors_open(event_name, &started, parent)? {
            return Ok(());
        }

        let StartedNode {
            id,
            parent_id: _,
            name,
            running,
            location,
            node_type,
            node_args,
        } = started;

        let mut node = ResultNode::new(Some(id), name, kind);
        node.location = location;
        node.node_type = node_type;
        node.node_args = node_args;

        let index = self.tree.add_child(parent, node);
        let registered = self.registry.put(id, index);
        debug_assert!(registered.is_ok(), "id {id} was checked to be unregistered");

        if running {
            self.set_node_and_ancestors_running(index);
        }
        Ok(())
    }

    /// Returns the parent for a started event, or `None` (after reporting an
    /// inconsistency) if there is no acceptable parent.
    fn find_valid_parent(
        &self,
        event_name: &'static str,
        started: &StartedNode,
    ) -> Result<Option<NodeIndex>, ConvertError> {
        let Some(parent_id) = started.parent_id else {
            self.inconsistency(Inconsistency::MissingParentId {
                event: event_name,
                id: started.id,
                name: started.name.clone(),
            })?;
            return Ok(None);
        };

        let parent = match self.registry.get(parent_id) {
            Some(parent) if parent_id.0 >= 0 => parent,
            _ => {
                self.inconsistency(Inconsistency::UnknownParent {
                    event: event_name,
                    id: started.id,
                    name: started.name.clone(),
                    parent_id,
                })?;
                return Ok(None);
            }
        };

        let parent_state = self.tree.node(parent).state;
        if !parent_state.accepts_children() {
            self.inconsistency(Inconsistency::ParentNotActive {
                event: event_name,
                id: started.id,
                name: started.name.clone(),
                parent_id,
                parent_state,
            })?;
            return Ok(None);
        }

        Ok(Some(parent))
    }

    /// Checks that a running start below `parent` would not sit under a
    /// completed node: the first ancestor that is not `NotRunning`, starting
    /// at `parent`, must not be terminal. Returns false after reporting an
    /// inconsistency otherwise.
    fn check_ancestors_open(
        &self,
        event_name: &'static str,
        started: &StartedNode,
        parent: NodeIndex,
    ) -> Result<bool, ConvertError> {
        let blocking = std::iter::once(parent)
            .chain(self.tree.ancestors(parent))
            .map(|index| self.tree.node(index))
            .find(|node| node.state != NodeState::NotRunning);
        match blocking {
            Some(node) if node.state.is_terminal() => {
                self.inconsistency(Inconsistency::AncestorCompleted {
                    event: event_name,
                    id: started.id,
                    name: started.name.clone(),
                    ancestor: node.name.clone(),
                    ancestor_state: node.state,
                })?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    /// Moves `lowest` and each of its `NotRunning` ancestors to `Running`,
    /// stopping at the first ancestor that is already running or done.
    ///
    /// The root is started by `TestingStarted` and is never touched here.
    fn set_node_and_ancestors_running(&mut self, lowest: NodeIndex) {
        let root = self.tree.root();
        let mut current = Some(lowest);
        while let Some(index) = current {
            if index == root {
                break;
            }
            let node = self.tree.node_mut(index);
            if node.state != NodeState::NotRunning {
                break;
            }
            node.state = NodeState::Running;
            node.started = true;
            let is_suite = node.is_suite();
            current = node.parent;

            if is_suite {
                self.notify("on_suite_started", index, |l, node| l.on_suite_started(node));
            } else {
                self.running.insert(index);
                self.notify("on_test_started", index, |l, node| l.on_test_started(node));
            }
        }
    }

    fn finish_node(
        &mut self,
        event_name: &'static str,
        id: NodeId,
        new_state: NodeState,
        record: impl FnOnce(&mut ResultNode),
    ) -> Result<(), ConvertError> {
        let Some(index) = self.registry.get(id) else {
            return self.inconsistency(Inconsistency::NeverOpened {
                event: event_name,
                id,
            });
        };
        if index == self.tree.root() {
            return self.inconsistency(Inconsistency::RootFinished { event: event_name });
        }

        let node = self.tree.node_mut(index);
        node.set_state(new_state)
            .map_err(|source| ConvertError::IllegalTransition {
                event: event_name,
                id,
                source,
            })?;
        record(node);
        let is_suite = node.is_suite();

        self.close_running_descendants(index);

        match (new_state, is_suite) {
            (NodeState::Failed, _) => {
                self.notify("on_test_failed", index, |l, node| l.on_test_failed(node))
            }
            (NodeState::Ignored, _) => {
                self.notify("on_test_ignored", index, |l, node| l.on_test_ignored(node))
            }
            (_, true) => {
                self.notify("on_suite_finished", index, |l, node| l.on_suite_finished(node))
            }
            (_, false) => {
                self.notify("on_test_finished", index, |l, node| l.on_test_finished(node))
            }
        }
        self.running.remove(index);
        Ok(())
    }

    fn fail_test(&mut self, event_name: &'static str, failed: FailedNode) -> Result<(), ConvertError> {
        let FailedNode {
            id,
            message,
            stack_trace,
            comparison,
            is_error,
            duration,
        } = failed;
        self.finish_node(event_name, id, NodeState::Failed, |node| {
            node.failure = Some(FailureDetails {
                message,
                stack_trace,
                comparison,
                is_error,
            });
            if duration.is_some() {
                node.duration = duration;
            }
        })
    }

    fn ignore_test(
        &mut self,
        event_name: &'static str,
        ignored: IgnoredNode,
    ) -> Result<(), ConvertError> {
        let IgnoredNode {
            id,
            reason,
            stack_trace,
        } = ignored;
        self.finish_node(event_name, id, NodeState::Ignored, |node| {
            node.ignore_reason = reason;
            if let Some(stack_trace) = stack_trace {
                node.append_output(OutputChannel::System, &stack_trace);
            }
        })
    }

    fn node_output(&mut self, output: NodeOutput) -> Result<(), ConvertError> {
        let NodeOutput { id, text, channel } = output;
        let target = match id {
            Some(id) => match self.registry.get(id) {
                Some(index) => index,
                None => return self.inconsistency(Inconsistency::UnknownOutputTarget { id }),
            },
            None => self.active_node(),
        };
        self.append_output(target, channel, text);
        Ok(())
    }

    fn add_error(&mut self, message: String, stack_trace: Option<String>, critical: bool) {
        let target = self.active_node();

        let mut text = message;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if let Some(stack_trace) = stack_trace {
            text.push_str(&stack_trace);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }

        let node = self.tree.node_mut(target);
        node.has_errors = true;
        if critical {
            node.has_critical_errors = true;
        }
        let ancestors: Vec<_> = self.tree.ancestors(target).collect();
        for ancestor in ancestors {
            self.tree.node_mut(ancestor).has_errors = true;
        }

        self.append_output(target, OutputChannel::Stderr, text);
    }

    // ---
    // Helpers
    // ---

    fn active_node(&self) -> NodeIndex {
        self.running.active_node(self.tree.root())
    }

    fn append_output(&mut self, target: NodeIndex, channel: OutputChannel, text: String) {
        if text.is_empty() {
            return;
        }
        self.tree.node_mut(target).append_output(channel, &text);
        let segment = OutputSegment { channel, text };
        self.notify("on_output", target, |l, node| l.on_output(node, &segment));
    }

    /// Closes whatever is still running below a node that just finished. Those
    /// nodes become `Finished`, are flagged terminated and leave the running
    /// set, children first.
    fn close_running_descendants(&mut self, index: NodeIndex) {
        let running = self.tree.running_descendants(index);
        if running.is_empty() {
            return;
        }
        warn!(
            "`{}` finished with {} node(s) still running below it, closing them as terminated",
            self.tree.node(index).name,
            running.len()
        );

        for descendant in running {
            let node = self.tree.node_mut(descendant);
            if let Err(error) = node.set_state(NodeState::Finished) {
                error!("failed to close `{}`: {error}", node.name);
                continue;
            }
            node.terminated = true;
            let is_suite = node.is_suite();
            self.running.remove(descendant);

            if is_suite {
                self.notify("on_suite_finished", descendant, |l, node| {
                    l.on_suite_finished(node)
                });
            } else {
                self.notify("on_test_finished", descendant, |l, node| {
                    l.on_test_finished(node)
                });
            }
        }
    }

    /// A run is complete if nothing is running and every top-level node
    /// reached a terminal state without being terminated.
    fn is_tree_complete(&self) -> bool {
        if !self.running.is_empty() {
            return false;
        }
        self.tree.root_node().children().iter().all(|&child| {
            let node = self.tree.node(child);
            node.state.is_terminal() && !node.terminated
        })
    }

    fn notify(
        &self,
        callback: &'static str,
        index: NodeIndex,
        f: impl Fn(&dyn TreeListener, NodeRef<'_>),
    ) {
        let node = self.tree.node_ref(index);
        self.listeners.broadcast(callback, |l| f(l, node));
    }

    fn inconsistency(&self, inconsistency: Inconsistency) -> Result<(), ConvertError> {
        if self.config.strict {
            Err(ConvertError::Inconsistency(inconsistency))
        } else {
            warn!("event stream inconsistency, dropping event: {inconsistency}");
            Ok(())
        }
    }
}
