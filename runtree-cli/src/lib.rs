// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `runtree` command-line tool.
//!
//! Replays a recorded JSON-lines event log through the tree reconstruction
//! engine and prints the resulting tree.

mod dispatch;
mod errors;
mod json;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
