// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arbitrary, mostly malformed event streams must never corrupt the tree.

use crate::helpers::convertor_with_stats;
use proptest::prelude::*;
use runtree::{
    config::ConvertorConfig,
    errors::{ConvertError, NamedTreeError},
    events::{FailedNode, FinishedNode, IgnoredNode, NamedEvent, NodeOutput, StartedNode, TreeEvent},
    listener::ListenerRegistry,
    named::NamedTreeBuilder,
    node::{NodeId, NodeState, OutputChannel},
    tree::ResultTree,
};
use smol_str::SmolStr;
use test_strategy::proptest;

fn node_id() -> impl Strategy<Value = i64> {
    -1i64..6
}

fn started_node() -> impl Strategy<Value = StartedNode> {
    (node_id(), prop::option::weighted(0.9, node_id()), any::<bool>()).prop_map(
        |(id, parent_id, running)| StartedNode {
            parent_id: parent_id.map(NodeId),
            running,
            ..StartedNode::new(id, 0, format!("node-{id}"))
        },
    )
}

fn tree_event() -> impl Strategy<Value = TreeEvent> {
    prop_oneof![
        Just(TreeEvent::TestingStarted),
        Just(TreeEvent::TestingFinished),
        started_node().prop_map(TreeEvent::SuiteStarted),
        started_node().prop_map(TreeEvent::TestStarted),
        node_id().prop_map(|id| TreeEvent::SuiteFinished(FinishedNode::new(id))),
        node_id().prop_map(|id| TreeEvent::TestFinished(FinishedNode::new(id))),
        node_id().prop_map(|id| TreeEvent::TestFailed(FailedNode::new(id, "failed"))),
        node_id().prop_map(|id| TreeEvent::TestIgnored(IgnoredNode {
            id: NodeId(id),
            reason: None,
            stack_trace: None,
        })),
        prop::option::of(node_id()).prop_map(|id| TreeEvent::TestOutput(NodeOutput {
            id: id.map(NodeId),
            text: "out\n".to_owned(),
            channel: OutputChannel::Stdout,
        })),
        any::<bool>().prop_map(|critical| TreeEvent::Error {
            message: "error".to_owned(),
            stack_trace: None,
            critical,
        }),
    ]
}

fn name() -> impl Strategy<Value = SmolStr> {
    prop::sample::select(&["a", "b", "c"][..]).prop_map(SmolStr::new)
}

fn named_event() -> impl Strategy<Value = NamedEvent> {
    prop_oneof![
        Just(NamedEvent::TestingStarted),
        Just(NamedEvent::TestingFinished),
        name().prop_map(|name| NamedEvent::SuiteStarted {
            name,
            location: None,
        }),
        name().prop_map(|name| NamedEvent::SuiteFinished { name }),
        name().prop_map(|name| NamedEvent::TestStarted {
            name,
            location: None,
        }),
        name().prop_map(|name| NamedEvent::TestFinished {
            name,
            duration: None,
        }),
        name().prop_map(|name| NamedEvent::TestFailed {
            name,
            message: "failed".to_owned(),
            stack_trace: None,
            is_error: false,
        }),
        name().prop_map(|name| NamedEvent::TestIgnored { name, reason: None }),
        prop::option::of(name()).prop_map(|name| NamedEvent::TestOutput {
            name,
            text: "out\n".to_owned(),
            channel: OutputChannel::Stdout,
        }),
    ]
}

/// Checks the tree against the states seen after the previous event, then
/// records the current states.
fn check_tree(tree: &ResultTree, previous: &mut Vec<NodeState>) {
    let root = tree.root();
    let root_state = tree.node(root).state();

    for index in tree.iter() {
        let node = tree.node(index);
        let state = node.state();
        if let Some(&before) = previous.get(index.get()) {
            assert!(
                before == state || NodeState::check_transition(before, state).is_ok(),
                "`{}` moved from {before} to {state}",
                node.name
            );
        }

        if index != root && state == NodeState::Running {
            let parent = node.parent().expect("non-root node has a parent");
            let parent_state = tree.node(parent).state();
            if parent == root {
                assert!(
                    !root_state.is_terminal(),
                    "`{}` is running under a completed root",
                    node.name
                );
            } else {
                assert_eq!(
                    parent_state,
                    NodeState::Running,
                    "`{}` is running under `{}`",
                    node.name,
                    tree.node(parent).name
                );
            }
        }
    }

    *previous = vec![NodeState::NotRunning; tree.len()];
    for index in tree.iter() {
        previous[index.get()] = tree.node(index).state();
    }
}

#[proptest(cases = 256)]
fn arbitrary_streams_keep_the_convertor_consistent(
    #[strategy(prop::collection::vec(tree_event(), 0..40))] events: Vec<TreeEvent>,
) {
    let (mut convertor, _stats) = convertor_with_stats(false);
    let mut previous = Vec::new();

    for event in events {
        let description = format!("{event:?}");
        if let Err(error) = convertor.apply(event) {
            assert!(
                matches!(error, ConvertError::IllegalTransition { .. }),
                "non-strict mode only rejects illegal transitions, got {error} for {description}"
            );
        }
        check_tree(convertor.tree(), &mut previous);

        for index in convertor.running_tests().iter() {
            let node = convertor.tree().node(index);
            assert_eq!(node.state(), NodeState::Running, "`{}` is in the running set", node.name);
        }
    }

    convertor.finish_testing();
    convertor.dispose();
    check_tree(convertor.tree(), &mut previous);
    assert!(convertor.tree().outcome().is_some());
}

#[proptest(cases = 256)]
fn arbitrary_streams_keep_the_named_builder_consistent(
    #[strategy(prop::collection::vec(named_event(), 0..40))] events: Vec<NamedEvent>,
) {
    let mut builder = NamedTreeBuilder::new(ConvertorConfig { strict: false }, ListenerRegistry::new());
    let mut previous = Vec::new();

    for event in events {
        let description = format!("{event:?}");
        if let Err(error) = builder.apply(event) {
            assert!(
                matches!(error, NamedTreeError::TestNotStarted { .. }),
                "non-strict mode only rejects unstarted tests, got {error} for {description}"
            );
        }
        check_tree(builder.tree(), &mut previous);
    }

    builder.finish();
    check_tree(builder.tree(), &mut previous);
    assert!(builder.tree().outcome().is_some());
}
