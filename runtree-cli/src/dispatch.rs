// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result, RuntreeExitCode},
    json::JsonTree,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use runtree::{
    config::{ConfigLocation, ConvertorConfig, RuntreeConfig},
    convertor::EventConvertor,
    events::{NamedEvent, TreeEvent},
    listener::ListenerRegistry,
    listeners::{RunStats, StatsSummary},
    named::NamedTreeBuilder,
    tree::{ResultTree, RunOutcome},
    worker::EventWorker,
};
use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    sync::Arc,
};
use tracing::{debug, error};

/// Rebuilds test result trees from recorded lifecycle events.
#[derive(Debug, Parser)]
#[command(name = "runtree", version, styles = clap_styles::style())]
pub struct RuntreeApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl RuntreeApp {
    /// Initializes logging and color support.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Replay(opts) => opts.exec(output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a JSON-lines event log and print the resulting tree
    ///
    /// Each line of the log is one event object, tagged by its `event` field.
    /// The exit code is 0 if the run finished cleanly, 1 if any event was
    /// rejected and 2 if the log ended before the run completed.
    Replay(ReplayOpts),
}

#[derive(Debug, Args)]
struct ReplayOpts {
    /// Event log to read, or `-` for standard input
    #[arg(value_name = "FILE")]
    input: Utf8PathBuf,

    /// How the log identifies nodes
    #[arg(long, value_enum, default_value_t)]
    protocol: Protocol,

    /// Treat event stream inconsistencies as errors [default: from config]
    #[arg(long)]
    strict: bool,

    /// Config file to use, or `none` to skip loading configuration
    #[arg(long, value_name = "PATH", env = "RUNTREE_CONFIG")]
    config: Option<String>,

    /// Output format for the tree
    #[arg(long, value_enum, default_value_t)]
    format: TreeFormat,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum Protocol {
    /// Nodes carry numeric ids and parent ids
    #[default]
    Id,
    /// Nodes are identified by name; nesting follows suite start/finish order
    Name,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum TreeFormat {
    /// An indented tree
    #[default]
    Tree,
    /// A single JSON document
    Json,
}

/// The result of replaying a log.
struct Replay {
    tree: ResultTree,
    rejected: usize,
    stats: StatsSummary,
}

impl ReplayOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = RuntreeConfig::load(ConfigLocation::from_cli_or_env(self.config.as_deref()))?;
        let convertor_config = ConvertorConfig {
            strict: self.strict || config.convertor.strict,
        };
        debug!(?convertor_config, protocol = ?self.protocol, "starting replay");

        let replay = match self.protocol {
            Protocol::Id => {
                let events = self.read_events::<TreeEvent>()?;
                replay_id_events(convertor_config, events)?
            }
            Protocol::Name => {
                let events = self.read_events::<NamedEvent>()?;
                replay_named_events(convertor_config, events)
            }
        };

        self.write_tree(&replay.tree, output, output_writer)?;
        write_summary(&replay, output, output_writer)
            .map_err(|err| ExpectedError::WriteOutput { err })?;

        let code = if replay.rejected > 0 {
            RuntreeExitCode::EVENTS_REJECTED
        } else if replay.tree.outcome() == Some(RunOutcome::Finished) {
            RuntreeExitCode::OK
        } else {
            RuntreeExitCode::INCOMPLETE_RUN
        };
        Ok(code)
    }

    fn source_name(&self) -> String {
        if self.input == "-" {
            "<stdin>".to_owned()
        } else {
            self.input.to_string()
        }
    }

    fn read_events<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let reader: Box<dyn BufRead> = if self.input == "-" {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(&self.input).map_err(|err| ExpectedError::EventLogOpen {
                path: self.input.clone(),
                err,
            })?;
            Box::new(BufReader::new(file))
        };
        parse_event_lines(reader, &self.source_name())
    }

    fn write_tree(
        &self,
        tree: &ResultTree,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<()> {
        let mut writer = output_writer.stdout_writer();
        match self.format {
            TreeFormat::Tree => {
                write!(writer, "{}", tree.display().with_styles(output.tree_styles()))
                    .map_err(|err| ExpectedError::WriteOutput { err })?;
            }
            TreeFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &JsonTree::new(tree))
                    .map_err(|err| ExpectedError::SerializeTree { err })?;
                writeln!(writer).map_err(|err| ExpectedError::WriteOutput { err })?;
            }
        }
        writer
            .flush()
            .map_err(|err| ExpectedError::WriteOutput { err })
    }
}

fn parse_event_lines<T: DeserializeOwned>(reader: impl BufRead, source_name: &str) -> Result<Vec<T>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| ExpectedError::EventLogRead {
            source_name: source_name.to_owned(),
            err,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|err| ExpectedError::EventParse {
            source_name: source_name.to_owned(),
            line_number: index + 1,
            err,
        })?;
        events.push(event);
    }
    debug!("read {} event(s) from {source_name}", events.len());
    Ok(events)
}

fn replay_id_events(config: ConvertorConfig, events: Vec<TreeEvent>) -> Result<Replay> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| ExpectedError::RuntimeBuild { err })?;

    let stats = Arc::new(RunStats::new());
    let listeners = ListenerRegistry::new();
    listeners.add(stats.clone());

    let report = runtime.block_on(async move {
        let handle = EventWorker::spawn(EventConvertor::new(config, listeners));
        let sender = handle.sender();
        for event in events {
            sender.send(event)?;
        }
        handle.finish().await
    })?;

    Ok(Replay {
        tree: report.tree,
        rejected: report.errors.len(),
        stats: stats.summary(),
    })
}

fn replay_named_events(config: ConvertorConfig, events: Vec<NamedEvent>) -> Replay {
    let stats = Arc::new(RunStats::new());
    let listeners = ListenerRegistry::new();
    listeners.add(stats.clone());

    let mut builder = NamedTreeBuilder::new(config, listeners);
    let mut rejected = 0;
    for event in events {
        if let Err(err) = builder.apply(event) {
            error!("failed to apply event: {err}");
            rejected += 1;
        }
    }
    builder.finish();

    Replay {
        tree: builder.into_tree(),
        rejected,
        stats: stats.summary(),
    }
}

fn write_summary(
    replay: &Replay,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> io::Result<()> {
    let styles = output.stderr_styles();
    let stats = &replay.stats;
    let mut writer = output_writer.stderr_writer();

    let outcome = match replay.tree.outcome() {
        Some(RunOutcome::Finished) => "finished".style(styles.pass),
        _ => "terminated".style(styles.fail),
    };
    write!(
        writer,
        "{:>12} {} tests: {} passed, {} failed, {} ignored",
        "Summary".style(styles.bold),
        outcome,
        stats.tests_passed.style(styles.pass),
        stats.tests_failed.style(styles.fail),
        stats.tests_ignored.style(styles.skip),
    )?;
    if stats.tests_interrupted > 0 {
        write!(
            writer,
            ", {} interrupted",
            stats.tests_interrupted.style(styles.skip)
        )?;
    }
    if replay.rejected > 0 {
        write!(
            writer,
            "; {} event(s) rejected",
            replay.rejected.style(styles.fail)
        )?;
    }
    writeln!(writer)?;
    writer.flush()
}
