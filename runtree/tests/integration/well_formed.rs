// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::helpers::convertor_with_stats;
use proptest::prelude::*;
use runtree::{
    events::{FailedNode, FinishedNode, IgnoredNode, StartedNode, TreeEvent},
    node::{NodeId, NodeState},
    tree::RunOutcome,
};
use std::collections::HashMap;
use test_strategy::{Arbitrary, proptest};

#[derive(Clone, Copy, Debug, Arbitrary)]
enum Outcome {
    Pass,
    Fail,
    Ignore,
}

#[derive(Clone, Debug)]
enum Shape {
    Test(Outcome),
    Suite(Vec<Shape>),
}

fn shape_forest() -> impl Strategy<Value = Vec<Shape>> {
    let leaf = any::<Outcome>().prop_map(Shape::Test);
    let shape = leaf.prop_recursive(3, 32, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Shape::Suite)
    });
    prop::collection::vec(shape, 0..5)
}

/// Expected parent id and terminal state for each node id.
type Expected = HashMap<i64, (i64, NodeState)>;

fn emit(
    shapes: &[Shape],
    parent: i64,
    next_id: &mut i64,
    events: &mut Vec<TreeEvent>,
    expected: &mut Expected,
) {
    for shape in shapes {
        *next_id += 1;
        let id = *next_id;
        let name = format!("node-{id}");
        match shape {
            Shape::Test(outcome) => {
                events.push(TreeEvent::TestStarted(StartedNode::new(id, parent, name)));
                let (event, state) = match outcome {
                    Outcome::Pass => (
                        TreeEvent::TestFinished(FinishedNode::new(id)),
                        NodeState::Finished,
                    ),
                    Outcome::Fail => (
                        TreeEvent::TestFailed(FailedNode::new(id, "failed")),
                        NodeState::Failed,
                    ),
                    Outcome::Ignore => (
                        TreeEvent::TestIgnored(IgnoredNode {
                            id: NodeId(id),
                            reason: None,
                            stack_trace: None,
                        }),
                        NodeState::Ignored,
                    ),
                };
                events.push(event);
                expected.insert(id, (parent, state));
            }
            Shape::Suite(children) => {
                events.push(TreeEvent::SuiteStarted(StartedNode::new(id, parent, name)));
                emit(children, id, next_id, events, expected);
                events.push(TreeEvent::SuiteFinished(FinishedNode::new(id)));
                expected.insert(id, (parent, NodeState::Finished));
            }
        }
    }
}

#[proptest(cases = 64)]
fn well_formed_streams_build_matching_trees(#[strategy(shape_forest())] shapes: Vec<Shape>) {
    let mut events = vec![TreeEvent::TestingStarted];
    let mut expected = Expected::new();
    emit(&shapes, 0, &mut 0, &mut events, &mut expected);
    events.push(TreeEvent::TestingFinished);

    let (mut convertor, stats) = convertor_with_stats(true);
    for event in events {
        convertor.apply(event).expect("well-formed events are accepted");
    }

    let tree = convertor.tree();
    assert_eq!(tree.outcome(), Some(RunOutcome::Finished));
    assert_eq!(tree.len(), expected.len() + 1, "one node per id");

    for index in tree.iter().skip(1) {
        let node = tree.node(index);
        let id = node.id.expect("every node has an id").0;
        let (parent_id, state) = expected[&id];
        let parent = node.parent().expect("non-root node has a parent");
        assert_eq!(tree.node(parent).id, Some(NodeId(parent_id)));
        assert_eq!(node.state(), state);
    }

    let summary = stats.summary();
    assert_eq!(summary.tests_completed(), tree.test_counts().total);
    assert!(summary.testing_finished);
}
