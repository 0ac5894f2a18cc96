// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reconstructed result tree.
//!
//! Nodes live in an arena owned by [`ResultTree`]; each non-root node has
//! exactly one parent, and children are kept in arrival order.
//!
//! # Display rules
//!
//! 1. **Root:** No tree characters.
//! 2. **Children:** `├─` (not last) or `└─` (last).
//! 3. **Continuation lines:** `│  ` when an ancestor has more siblings below
//!    it, three spaces otherwise.

use crate::node::{NodeId, NodeIndex, NodeKind, NodeState, ResultNode};
use owo_colors::{OwoColorize, Style};
use smol_str::SmolStr;
use std::{fmt, ops::Deref};

/// How a run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// Every top-level node reached a terminal state and nothing was left
    /// running.
    Finished,
    /// The stream ended with nodes still incomplete, e.g. because the remote
    /// run was aborted.
    Terminated,
}

/// An arena-backed tree of test and suite results.
#[derive(Clone, Debug)]
pub struct ResultTree {
    nodes: Vec<ResultNode>,
    outcome: Option<RunOutcome>,
}

impl ResultTree {
    /// The default name for the tests root.
    pub const DEFAULT_ROOT_NAME: &'static str = "[root]";

    /// Creates a tree containing only a root suite with id [`NodeId::ROOT`].
    pub fn new(root_name: impl Into<SmolStr>) -> Self {
        Self {
            nodes: vec![ResultNode::new(
                Some(NodeId::ROOT),
                root_name,
                NodeKind::Suite,
            )],
            outcome: None,
        }
    }

    /// Returns the index of the root.
    #[inline]
    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// Returns the root node.
    #[inline]
    pub fn root_node(&self) -> &ResultNode {
        &self.nodes[0]
    }

    /// Returns the node at `index`, or `None` if it does not belong to this
    /// tree.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&ResultNode> {
        self.nodes.get(index.0)
    }

    /// Returns the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this tree.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &ResultNode {
        &self.nodes[index.0]
    }

    /// Returns the node at `index` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this tree.
    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut ResultNode {
        &mut self.nodes[index.0]
    }

    /// Returns a borrowed view of the node at `index`.
    #[inline]
    pub fn node_ref(&self, index: NodeIndex) -> NodeRef<'_> {
        NodeRef { tree: self, index }
    }

    /// Returns the number of nodes, including the root.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Attaches `node` as the last child of `parent` and returns its index.
    pub fn add_child(&mut self, parent: NodeIndex, mut node: ResultNode) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(index);
        index
    }

    /// Iterates over the parents of `index`, nearest first. `index` itself is
    /// not included.
    pub fn ancestors(&self, index: NodeIndex) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.node(index).parent,
        }
    }

    /// Iterates over `index` and everything below it in depth-first pre-order.
    pub fn descendants(&self, index: NodeIndex) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![index],
        }
    }

    /// Returns the `Running` nodes strictly below `index`, each listed before
    /// its parent.
    pub fn running_descendants(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut running: Vec<_> = self
            .descendants(index)
            .skip(1)
            .filter(|&node| self.node(node).state == NodeState::Running)
            .collect();
        running.reverse();
        running
    }

    /// Iterates over every node in depth-first pre-order, starting at the
    /// root.
    pub fn iter(&self) -> Descendants<'_> {
        self.descendants(self.root())
    }

    /// Returns the first child of `parent` with the given name, searching from
    /// the most recently added child.
    pub fn find_child(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.node(parent)
            .children
            .iter()
            .rev()
            .copied()
            .find(|&child| self.node(child).name == name)
    }

    /// Returns how the run ended, once it has.
    #[inline]
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub(crate) fn set_outcome(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }

    /// Counts the tests in the tree by state.
    pub fn test_counts(&self) -> TestCounts {
        let mut counts = TestCounts::default();
        for node in self.nodes.iter().filter(|node| node.kind == NodeKind::Test) {
            counts.total += 1;
            match node.state {
                NodeState::NotRunning => counts.not_run += 1,
                NodeState::Running => counts.running += 1,
                NodeState::Finished if node.terminated => counts.interrupted += 1,
                NodeState::Finished => counts.passed += 1,
                NodeState::Failed => counts.failed += 1,
                NodeState::Ignored => counts.ignored += 1,
            }
        }
        counts
    }

    /// Returns a displayer for this tree.
    pub fn display(&self) -> TreeDisplay<'_> {
        TreeDisplay {
            tree: self,
            styles: TreeStyles::default(),
        }
    }
}

/// Test totals broken down by state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TestCounts {
    /// All tests.
    pub total: usize,
    /// Tests that never started.
    pub not_run: usize,
    /// Tests still running.
    pub running: usize,
    /// Tests that finished successfully.
    pub passed: usize,
    /// Tests closed as terminated because an enclosing node finished first.
    pub interrupted: usize,
    /// Tests that failed.
    pub failed: usize,
    /// Tests that were ignored.
    pub ignored: usize,
}

/// A borrowed view of a node together with the tree it belongs to.
///
/// This is what listeners receive, so that they can walk to the parent or
/// children of the node being reported.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ResultTree,
    index: NodeIndex,
}

impl<'a> NodeRef<'a> {
    /// Returns the index of this node.
    #[inline]
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Returns the tree this node belongs to.
    #[inline]
    pub fn tree(&self) -> &'a ResultTree {
        self.tree
    }

    /// Returns the parent, or `None` for the root.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.tree
            .node(self.index)
            .parent
            .map(|index| self.tree.node_ref(index))
    }

    /// Iterates over the children in arrival order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.node(self.index)
            .children
            .iter()
            .map(move |&index| tree.node_ref(index))
    }
}

impl Deref for NodeRef<'_> {
    type Target = ResultNode;

    fn deref(&self) -> &ResultNode {
        self.tree.node(self.index)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish()
    }
}

/// Iterator returned by [`ResultTree::ancestors`].
#[derive(Clone, Debug)]
pub struct Ancestors<'a> {
    tree: &'a ResultTree,
    next: Option<NodeIndex>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.next?;
        self.next = self.tree.node(current).parent;
        Some(current)
    }
}

/// Iterator returned by [`ResultTree::descendants`] and [`ResultTree::iter`].
#[derive(Clone, Debug)]
pub struct Descendants<'a> {
    tree: &'a ResultTree,
    stack: Vec<NodeIndex>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let current = self.stack.pop()?;
        // Push in reverse so that the first child is visited first.
        self.stack
            .extend(self.tree.node(current).children.iter().rev().copied());
        Some(current)
    }
}

/// Styles used by [`TreeDisplay`].
#[derive(Clone, Debug, Default)]
pub struct TreeStyles {
    suite: Style,
    running: Style,
    passed: Style,
    failed: Style,
    ignored: Style,
    dimmed: Style,
}

impl TreeStyles {
    /// Enables colors.
    pub fn colorize(&mut self) {
        self.suite = Style::new().bold();
        self.running = Style::new().cyan().bold();
        self.passed = Style::new().green().bold();
        self.failed = Style::new().red().bold();
        self.ignored = Style::new().yellow();
        self.dimmed = Style::new().dimmed();
    }

    fn for_state(&self, state: NodeState) -> Style {
        match state {
            NodeState::NotRunning => self.dimmed,
            NodeState::Running => self.running,
            NodeState::Finished => self.passed,
            NodeState::Failed => self.failed,
            NodeState::Ignored => self.ignored,
        }
    }
}

/// Renders a [`ResultTree`] as indented text.
#[derive(Clone, Debug)]
pub struct TreeDisplay<'a> {
    tree: &'a ResultTree,
    styles: TreeStyles,
}

impl TreeDisplay<'_> {
    /// Sets the styles to render with.
    pub fn with_styles(mut self, styles: TreeStyles) -> Self {
        self.styles = styles;
        self
    }

    fn write_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        index: NodeIndex,
        prefix: &str,
        branch: &str,
    ) -> fmt::Result {
        let node = self.tree.node(index);
        let name_style = if node.is_suite() {
            self.styles.suite
        } else {
            Style::new()
        };
        write!(
            f,
            "{prefix}{branch}{} [{}]",
            node.name.style(name_style),
            node.state.style(self.styles.for_state(node.state)),
        )?;
        if node.terminated {
            write!(f, " {}", "(terminated)".style(self.styles.failed))?;
        }
        if let Some(duration) = node.duration {
            write!(
                f,
                " {}",
                format!("{:.3}s", duration.as_secs_f64()).style(self.styles.dimmed)
            )?;
        }
        writeln!(f)
    }

    fn write_children(
        &self,
        f: &mut fmt::Formatter<'_>,
        index: NodeIndex,
        prefix: &str,
    ) -> fmt::Result {
        let children = &self.tree.node(index).children;
        for (i, &child) in children.iter().enumerate() {
            let is_last = i + 1 == children.len();
            let (branch, continuation) = if is_last {
                ("└─ ", "   ")
            } else {
                ("├─ ", "│  ")
            };
            self.write_node(f, child, prefix, branch)?;
            let child_prefix = format!("{prefix}{continuation}");
            self.write_children(f, child, &child_prefix)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.tree.root();
        self.write_node(f, root, "", "")?;
        self.write_children(f, root, "")
    }
}
