// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use runtree::errors::{ConfigError, WorkerError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes returned by `runtree`.
#[doc(hidden)]
pub enum RuntreeExitCode {}

impl RuntreeExitCode {
    /// Every node completed and no events were rejected.
    pub const OK: i32 = 0;

    /// One or more events were rejected.
    pub const EVENTS_REJECTED: i32 = 1;

    /// The event log ended before the run completed.
    pub const INCOMPLETE_RUN: i32 = 2;

    /// An error occurred while writing output.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The log or the configuration could not be read.
    pub const SETUP_ERROR: i32 = 96;
}

// The #[error()] strings are placeholders: errors are printed with
// display_to_stderr.

/// An error that prevented a replay from producing a tree.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config load error")]
    ConfigLoad {
        #[from]
        err: ConfigError,
    },
    #[error("failed to open event log")]
    EventLogOpen {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read event log")]
    EventLogRead {
        source_name: String,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse event log")]
    EventParse {
        source_name: String,
        line_number: usize,
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to build async runtime")]
    RuntimeBuild {
        #[source]
        err: std::io::Error,
    },
    #[error("event worker failed")]
    Worker {
        #[from]
        err: WorkerError,
    },
    #[error("failed to write output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to serialize tree")]
    SerializeTree {
        #[source]
        err: serde_json::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigLoad { .. }
            | Self::EventLogOpen { .. }
            | Self::EventLogRead { .. }
            | Self::EventParse { .. }
            | Self::RuntimeBuild { .. }
            | Self::Worker { .. } => RuntreeExitCode::SETUP_ERROR,
            Self::WriteOutput { .. } | Self::SerializeTree { .. } => {
                RuntreeExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ConfigLoad { err } => {
                error!("failed to load runtree configuration");
                Some(err as &dyn Error)
            }
            Self::EventLogOpen { path, err } => {
                error!("failed to open event log `{path}`");
                Some(err as &dyn Error)
            }
            Self::EventLogRead { source_name, err } => {
                error!("failed to read event log `{source_name}`");
                Some(err as &dyn Error)
            }
            Self::EventParse {
                source_name,
                line_number,
                err,
            } => {
                error!("failed to parse event at {source_name}:{line_number}");
                Some(err as &dyn Error)
            }
            Self::RuntimeBuild { err } => {
                error!("failed to build the async runtime");
                Some(err as &dyn Error)
            }
            Self::Worker { err } => {
                error!("{err}");
                None
            }
            Self::WriteOutput { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::SerializeTree { err } => {
                error!("failed to serialize the result tree");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: "runtree::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
