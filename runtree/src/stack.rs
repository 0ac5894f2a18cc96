// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stack of open suites for transports that identify suites by name only.
//!
//! Without ids, nesting is implied by the order of start and finish events:
//! a suite start pushes a frame, a suite finish pops it. Names are assumed to
//! be unique among the frames open at any one time.
//!
//! Noisy transports sometimes skip a close event. In non-strict mode, closing
//! a suite that is open but not on top discards the frames above it; closing
//! a suite that is not open at all is ignored.

use crate::{errors::StackError, node::NodeIndex};
use smol_str::SmolStr;
use tracing::debug;

/// An open suite.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiteFrame {
    /// The suite name.
    pub name: SmolStr,
    /// The suite's node in the result tree.
    pub node: NodeIndex,
}

/// The stack of currently open suites, innermost last.
#[derive(Clone, Debug, Default)]
pub struct SuiteStack {
    frames: Vec<SuiteFrame>,
    strict: bool,
}

impl SuiteStack {
    /// Creates an empty stack.
    pub fn new(strict: bool) -> Self {
        Self {
            frames: Vec::new(),
            strict,
        }
    }

    /// Pushes a newly opened suite.
    pub fn push_suite(&mut self, frame: SuiteFrame) {
        self.frames.push(frame);
    }

    /// Returns the innermost open suite.
    pub fn current_suite(&self) -> Option<&SuiteFrame> {
        self.frames.last()
    }

    /// Closes the suite named `expected`.
    ///
    /// Returns the closed frame, or `None` if nothing was closed. In
    /// non-strict mode, frames above a matching frame are discarded; use
    /// [`pop_suite_with_discarded`](Self::pop_suite_with_discarded) to get at
    /// them.
    pub fn pop_suite(&mut self, expected: &str) -> Result<Option<SuiteFrame>, StackError> {
        Ok(self
            .pop_suite_with_discarded(expected)?
            .map(|popped| popped.frame))
    }

    /// Like [`pop_suite`](Self::pop_suite), but also returns the frames that
    /// were discarded to reach the closed one, innermost first.
    pub fn pop_suite_with_discarded(
        &mut self,
        expected: &str,
    ) -> Result<Option<PoppedSuite>, StackError> {
        let Some(top) = self.frames.last() else {
            if self.strict {
                debug!(
                    "pop error: suite stack is empty, the test runner tried to close \
                     suite `{expected}` after all suites were closed"
                );
            }
            return Ok(None);
        };

        if top.name == expected {
            return Ok(self.frames.pop().map(|frame| PoppedSuite {
                frame,
                discarded: Vec::new(),
            }));
        }

        if self.strict {
            return Err(StackError::Mismatch {
                expected: expected.into(),
                current: top.name.clone(),
            });
        }

        // Recover from a skipped close event by unwinding to the matching
        // frame, if there is one.
        let Some(position) = self.frames.iter().rposition(|frame| frame.name == expected) else {
            debug!(
                "suite `{expected}` is not open (current suite: `{}`), ignoring close",
                top.name
            );
            return Ok(None);
        };

        let mut discarded = self.frames.split_off(position + 1);
        discarded.reverse();
        debug!(
            "closing suite `{expected}` discarded {} unclosed suite(s) above it",
            discarded.len()
        );
        Ok(self.frames.pop().map(|frame| PoppedSuite { frame, discarded }))
    }

    /// Returns the number of open suites.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if no suites are open.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Discards every frame, returning them innermost first.
    pub fn clear(&mut self) -> Vec<SuiteFrame> {
        let mut frames = std::mem::take(&mut self.frames);
        frames.reverse();
        frames
    }

    /// Returns the names of the open suites, outermost first.
    pub fn suite_names(&self) -> Vec<SmolStr> {
        self.frames.iter().map(|frame| frame.name.clone()).collect()
    }
}

/// The result of [`SuiteStack::pop_suite_with_discarded`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoppedSuite {
    /// The closed suite.
    pub frame: SuiteFrame,
    /// Suites that were open above it, innermost first.
    pub discarded: Vec<SuiteFrame>,
}
