// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree building for transports that identify suites and tests by name.
//!
//! Nesting is reconstructed with a [`SuiteStack`]: a test or suite always
//! belongs to the innermost open suite. Unlike the id-based
//! [`EventConvertor`](crate::convertor::EventConvertor), closing a test that
//! was never started is an error in every mode.

use crate::{
    config::ConvertorConfig,
    errors::NamedTreeError,
    events::NamedEvent,
    listener::{ListenerRegistry, TreeListener},
    node::{FailureDetails, NodeIndex, NodeKind, NodeState, OutputChannel, OutputSegment, ResultNode},
    output::RunningTests,
    stack::{SuiteFrame, SuiteStack},
    tree::{NodeRef, ResultTree, RunOutcome},
};
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Builds a [`ResultTree`] from [`NamedEvent`]s.
#[derive(Debug)]
pub struct NamedTreeBuilder {
    config: ConvertorConfig,
    tree: ResultTree,
    suites: SuiteStack,
    running_by_name: HashMap<SmolStr, NodeIndex>,
    running: RunningTests,
    listeners: ListenerRegistry,
    finished: bool,
}

impl NamedTreeBuilder {
    /// Creates a builder with an empty tree.
    pub fn new(config: ConvertorConfig, listeners: ListenerRegistry) -> Self {
        Self {
            config,
            tree: ResultTree::new(ResultTree::DEFAULT_ROOT_NAME),
            suites: SuiteStack::new(config.strict),
            running_by_name: HashMap::new(),
            running: RunningTests::new(),
            listeners,
            finished: false,
        }
    }

    /// Returns the tree built so far.
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Consumes the builder, returning the tree.
    pub fn into_tree(self) -> ResultTree {
        self.tree
    }

    /// Returns the names of the currently open suites, outermost first.
    pub fn open_suites(&self) -> Vec<SmolStr> {
        self.suites.suite_names()
    }

    /// Applies a single event.
    pub fn apply(&mut self, event: NamedEvent) -> Result<(), NamedTreeError> {
        let event_name = event.kind_name();
        if self.finished && !matches!(event, NamedEvent::TestingFinished) {
            if self.config.strict {
                return Err(NamedTreeError::AfterFinish { event: event_name });
            }
            warn!("{event_name} received after the run finished, ignoring");
            return Ok(());
        }
        debug!(event = event_name, "applying named event");

        match event {
            NamedEvent::TestingStarted => {
                let root = self.tree.root();
                let node = self.tree.node_mut(root);
                if node.state != NodeState::NotRunning {
                    warn!("testing has already been started, ignoring");
                    return Ok(());
                }
                node.state = NodeState::Running;
                node.started = true;
                self.notify("on_testing_started", root, |l, node| {
                    l.on_testing_started(node)
                });
            }
            NamedEvent::TestingFinished => self.finish(),
            NamedEvent::SuiteStarted { name, location } => {
                let mut suite = ResultNode::new(None, name.clone(), NodeKind::Suite);
                suite.location = location;
                let index = self.start_node(suite);
                self.suites.push_suite(SuiteFrame { name, node: index });
                self.notify("on_suite_started", index, |l, node| l.on_suite_started(node));
            }
            NamedEvent::SuiteFinished { name } => self.finish_suite(event_name, &name)?,
            NamedEvent::TestStarted { name, location } => {
                if self.running_by_name.contains_key(&name) {
                    if self.config.strict {
                        return Err(NamedTreeError::DuplicateRunningTest { name });
                    }
                    warn!("test `{name}` started while a test with the same name is running, ignoring");
                    return Ok(());
                }
                let mut test = ResultNode::new(None, name.clone(), NodeKind::Test);
                test.location = location;
                let index = self.start_node(test);
                self.running_by_name.insert(name, index);
                self.running.insert(index);
                self.notify("on_test_started", index, |l, node| l.on_test_started(node));
            }
            NamedEvent::TestFinished { name, duration } => {
                self.finish_test(event_name, name, NodeState::Finished, |node| {
                    node.duration = duration;
                })?;
            }
            NamedEvent::TestFailed {
                name,
                message,
                stack_trace,
                is_error,
            } => {
                self.finish_test(event_name, name, NodeState::Failed, |node| {
                    node.failure = Some(FailureDetails {
                        message,
                        stack_trace,
                        comparison: None,
                        is_error,
                    });
                })?;
            }
            NamedEvent::TestIgnored { name, reason } => {
                self.finish_test(event_name, name, NodeState::Ignored, |node| {
                    node.ignore_reason = reason;
                })?;
            }
            NamedEvent::TestOutput {
                name,
                text,
                channel,
            } => {
                let target = name
                    .and_then(|name| self.running_by_name.get(&name).copied())
                    .unwrap_or_else(|| self.active_node());
                self.append_output(target, channel, text);
            }
            NamedEvent::UncapturedOutput { text, channel } => {
                let active = self.active_node();
                self.append_output(active, channel, text);
            }
        }
        Ok(())
    }

    /// Completes the run. Calling this more than once has no further effect.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let root = self.tree.root();
        if self.suites.is_empty() && self.running_by_name.is_empty() {
            if let Err(error) = self.tree.node_mut(root).set_state(NodeState::Finished) {
                warn!("failed to finish the tests root: {error}");
            }
            self.tree.set_outcome(RunOutcome::Finished);
        } else {
            warn!(
                "run ended with {} suite(s) open and {} test(s) running",
                self.suites.len(),
                self.running_by_name.len()
            );
            self.tree.node_mut(root).terminated = true;
            self.tree.set_outcome(RunOutcome::Terminated);
        }

        self.suites.clear();
        self.running_by_name.clear();
        self.running.clear();

        self.notify("on_testing_finished", root, |l, node| {
            l.on_testing_finished(node)
        });
    }

    fn start_node(&mut self, mut node: ResultNode) -> NodeIndex {
        let parent = self
            .suites
            .current_suite()
            .map_or_else(|| self.tree.root(), |frame| frame.node);
        node.state = NodeState::Running;
        node.started = true;
        self.tree.add_child(parent, node)
    }

    fn finish_suite(&mut self, event_name: &'static str, name: &str) -> Result<(), NamedTreeError> {
        let Some(popped) = self.suites.pop_suite_with_discarded(name)? else {
            return Ok(());
        };

        // Tests still running in the closed suites are interrupted: they are
        // finished as terminated before their suites close.
        let interrupted: Vec<_> = self
            .tree
            .running_descendants(popped.frame.node)
            .into_iter()
            .filter(|&index| !self.tree.node(index).is_suite())
            .collect();
        if !interrupted.is_empty() {
            warn!(
                "suite `{name}` closed with {} test(s) still running, closing them as terminated",
                interrupted.len()
            );
        }
        for index in interrupted {
            self.running_by_name.retain(|_, &mut running| running != index);
            self.running.remove(index);
            let node = self.tree.node_mut(index);
            node.set_state(NodeState::Finished)
                .map_err(|source| NamedTreeError::IllegalTransition {
                    event: event_name,
                    name: node.name.clone(),
                    source,
                })?;
            node.terminated = true;
            self.notify("on_test_finished", index, |l, node| l.on_test_finished(node));
        }

        for frame in popped.discarded.iter().chain(std::iter::once(&popped.frame)) {
            self.tree
                .node_mut(frame.node)
                .set_state(NodeState::Finished)
                .map_err(|source| NamedTreeError::IllegalTransition {
                    event: event_name,
                    name: frame.name.clone(),
                    source,
                })?;
            self.notify("on_suite_finished", frame.node, |l, node| {
                l.on_suite_finished(node)
            });
        }
        Ok(())
    }

    fn finish_test(
        &mut self,
        event_name: &'static str,
        name: SmolStr,
        new_state: NodeState,
        record: impl FnOnce(&mut ResultNode),
    ) -> Result<(), NamedTreeError> {
        let Some(index) = self.running_by_name.remove(&name) else {
            return Err(NamedTreeError::TestNotStarted {
                event: event_name,
                name,
            });
        };

        let node = self.tree.node_mut(index);
        node.set_state(new_state)
            .map_err(|source| NamedTreeError::IllegalTransition {
                event: event_name,
                name,
                source,
            })?;
        record(node);
        self.running.remove(index);

        match new_state {
            NodeState::Failed => {
                self.notify("on_test_failed", index, |l, node| l.on_test_failed(node))
            }
            NodeState::Ignored => {
                self.notify("on_test_ignored", index, |l, node| l.on_test_ignored(node))
            }
            _ => self.notify("on_test_finished", index, |l, node| l.on_test_finished(node)),
        }
        Ok(())
    }

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

    fn notify(
        &self,
        callback: &'static str,
        index: NodeIndex,
        f: impl Fn(&dyn TreeListener, NodeRef<'_>),
    ) {
        let node = self.tree.node_ref(index);
        self.listeners.broadcast(callback, |l| f(l, node));
    }
}
