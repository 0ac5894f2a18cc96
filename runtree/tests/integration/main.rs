// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod helpers;
mod malformed;
mod replay;
mod scenarios;
mod well_formed;
mod worker;
