// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::helpers::{apply_all, convertor_with_stats, flatten};
use pretty_assertions::assert_eq;
use runtree::{
    events::{FinishedNode, StartedNode, TreeEvent},
    node::{NodeId, NodeState},
    tree::RunOutcome,
};

fn suite_with_one_test() -> Vec<TreeEvent> {
    vec![
        TreeEvent::TestingStarted,
        TreeEvent::SuiteStarted(StartedNode::new(1, 0, "S")),
        TreeEvent::TestStarted(StartedNode::new(2, 1, "t1")),
        TreeEvent::TestFinished(FinishedNode::new(2)),
        TreeEvent::SuiteFinished(FinishedNode::new(1)),
        TreeEvent::TestingFinished,
    ]
}

#[test]
fn clean_completion() {
    let (mut convertor, stats) = convertor_with_stats(false);
    apply_all(&mut convertor, suite_with_one_test());

    let tree = convertor.into_tree();
    assert_eq!(tree.outcome(), Some(RunOutcome::Finished));
    assert!(!tree.root_node().is_terminated());
    assert_eq!(tree.root_node().id, Some(NodeId::ROOT));
    assert_eq!(
        flatten(&tree),
        vec![
            ("S".to_owned(), NodeState::Finished),
            ("t1".to_owned(), NodeState::Finished),
        ]
    );

    let summary = stats.summary();
    assert_eq!(summary.tests_passed, 1);
    assert_eq!(summary.suites_finished, 1);
    assert!(summary.testing_finished);
}

#[test]
fn truncated_stream() {
    let (mut convertor, stats) = convertor_with_stats(false);
    let mut events = suite_with_one_test();
    // Drop SuiteFinished and TestingFinished.
    events.truncate(4);
    apply_all(&mut convertor, events);
    convertor.finish_testing();
    convertor.dispose();

    let tree = convertor.into_tree();
    assert_eq!(tree.outcome(), Some(RunOutcome::Terminated));
    assert!(tree.root_node().is_terminated());
    assert_eq!(
        flatten(&tree),
        vec![
            ("S".to_owned(), NodeState::Running),
            ("t1".to_owned(), NodeState::Finished),
        ]
    );
    assert!(stats.summary().testing_finished);
}

#[test]
fn registered_tree_then_execution() {
    // Some runners announce the whole tree before running anything.
    let (mut convertor, stats) = convertor_with_stats(false);
    apply_all(
        &mut convertor,
        [
            TreeEvent::TestingStarted,
            TreeEvent::SuiteStarted(StartedNode::new(1, 0, "S").not_running()),
            TreeEvent::TestStarted(StartedNode::new(2, 1, "a").not_running()),
            TreeEvent::TestStarted(StartedNode::new(3, 1, "b").not_running()),
        ],
    );
    assert_eq!(stats.summary().suites_started, 0);

    apply_all(
        &mut convertor,
        [
            TreeEvent::TestStarted(StartedNode::new(2, 1, "a")),
            TreeEvent::TestFinished(FinishedNode::new(2)),
            TreeEvent::TestStarted(StartedNode::new(3, 1, "b")),
            TreeEvent::TestFinished(FinishedNode::new(3)),
            TreeEvent::SuiteFinished(FinishedNode::new(1)),
            TreeEvent::TestingFinished,
        ],
    );

    let summary = stats.summary();
    assert_eq!(summary.suites_started, 1, "suite started exactly once");
    assert_eq!(summary.tests_started, 2);
    assert_eq!(convertor.tree().outcome(), Some(RunOutcome::Finished));
}

#[test]
fn never_started_test_blocks_clean_completion() {
    let (mut convertor, _stats) = convertor_with_stats(false);
    apply_all(
        &mut convertor,
        [
            TreeEvent::TestingStarted,
            TreeEvent::TestStarted(StartedNode::new(1, 0, "pending").not_running()),
            TreeEvent::TestingFinished,
        ],
    );
    assert_eq!(convertor.tree().outcome(), Some(RunOutcome::Terminated));
}
