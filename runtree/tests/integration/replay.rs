// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replays recorded JSON-lines event logs.

use crate::helpers::convertor_with_stats;
use indoc::indoc;
use pretty_assertions::assert_eq;
use runtree::{
    config::ConvertorConfig,
    events::{NamedEvent, TreeEvent},
    listener::ListenerRegistry,
    named::NamedTreeBuilder,
    node::OutputChannel,
    tree::RunOutcome,
};

fn parse_lines<T: serde::de::DeserializeOwned>(input: &str) -> Vec<T> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("event is valid"))
        .collect()
}

#[test]
fn id_based_log() {
    let log = indoc! {r#"
        {"event": "testing-started"}
        {"event": "tests-count-in-suite", "count": 2}
        {"event": "suite-started", "id": 1, "parent-id": 0, "name": "device::net", "location": "file://net.rs"}
        {"event": "test-started", "id": 2, "parent-id": 1, "name": "connects"}
        {"event": "test-output", "text": "dialing\n", "channel": "stdout"}
        {"event": "test-finished", "id": 2, "duration": "120ms"}
        {"event": "test-started", "id": 3, "parent-id": 1, "name": "times_out"}
        {"event": "error", "message": "socket closed", "stack-trace": "at net.rs:40"}
        {"event": "test-failed", "id": 3, "message": "timed out", "is-error": true, "duration": "5s"}
        {"event": "suite-finished", "id": 1}
        {"event": "testing-finished"}
    "#};

    let (mut convertor, stats) = convertor_with_stats(true);
    for event in parse_lines::<TreeEvent>(log) {
        convertor.apply(event).expect("log is consistent");
    }

    let tree = convertor.into_tree();
    assert_eq!(tree.outcome(), Some(RunOutcome::Finished));
    assert_eq!(
        tree.display().to_string(),
        indoc! {"
            [root] [finished]
            └─ device::net [finished]
               ├─ connects [finished] 0.120s
               └─ times_out [failed] 5.000s
        "}
    );

    let suite = tree.node(tree.root_node().children()[0]);
    assert_eq!(suite.location.as_deref(), Some("file://net.rs"));
    assert!(suite.has_errors());

    let connects = tree.node(suite.children()[0]);
    assert_eq!(connects.output_text(OutputChannel::Stdout), "dialing\n");
    let times_out = tree.node(suite.children()[1]);
    assert_eq!(
        times_out.output_text(OutputChannel::Stderr),
        "socket closed\nat net.rs:40\n"
    );
    assert!(times_out.failure.as_ref().is_some_and(|f| f.is_error));

    let summary = stats.summary();
    assert_eq!(summary.declared_tests, 2);
    assert_eq!(summary.tests_completed(), 2);
}

#[test]
fn name_based_log() {
    let log = indoc! {r#"
        {"event": "testing-started"}
        {"event": "suite-started", "name": "outer"}
        {"event": "suite-started", "name": "inner"}
        {"event": "test-started", "name": "t"}
        {"event": "test-ignored", "name": "t", "reason": "flaky"}
        {"event": "suite-finished", "name": "outer"}
        {"event": "testing-finished"}
    "#};

    let mut builder = NamedTreeBuilder::new(ConvertorConfig::default(), ListenerRegistry::new());
    for event in parse_lines::<NamedEvent>(log) {
        builder.apply(event).expect("log is accepted");
    }

    let tree = builder.into_tree();
    assert_eq!(tree.outcome(), Some(RunOutcome::Finished));
    assert_eq!(
        tree.display().to_string(),
        indoc! {"
            [root] [finished]
            └─ outer [finished]
               └─ inner [finished]
                  └─ t [ignored]
        "}
    );
}
