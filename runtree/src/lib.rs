// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Reconstructs a navigable tree of test and suite results from a stream of
//! lifecycle events produced by a remote, out-of-process test run.
//!
//! Events arrive one at a time and may be incomplete, duplicated, out of order
//! or refer to nodes that never existed. The [`EventConvertor`](convertor::EventConvertor)
//! applies them to a [`ResultTree`](tree::ResultTree) while keeping the tree
//! consistent, and notifies registered [`TreeListener`](listener::TreeListener)s
//! as the tree evolves. The [`worker`] module runs a convertor as a
//! single-consumer event loop.
//!
//! Transports that only carry suite names rather than ids are handled by
//! [`NamedTreeBuilder`](named::NamedTreeBuilder), built on top of
//! [`SuiteStack`](stack::SuiteStack).

pub mod config;
pub mod convertor;
pub mod errors;
pub mod events;
pub mod listener;
pub mod listeners;
pub mod named;
pub mod node;
pub mod output;
pub mod registry;
pub mod stack;
#[cfg(test)]
mod test_helpers;
pub mod tree;
pub mod worker;
