// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON rendering of result trees.

use runtree::{
    node::{NodeIndex, OutputSegment},
    tree::{ResultTree, RunOutcome},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct JsonTree<'a> {
    outcome: Option<&'static str>,
    root: JsonNode<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct JsonNode<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    name: &'a str,
    kind: &'static str,
    state: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    terminated: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    has_errors: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignore_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "no_output")]
    output: &'a [OutputSegment],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode<'a>>,
}

fn no_output(output: &&[OutputSegment]) -> bool {
    output.is_empty()
}

impl<'a> JsonTree<'a> {
    pub(crate) fn new(tree: &'a ResultTree) -> Self {
        let outcome = tree.outcome().map(|outcome| match outcome {
            RunOutcome::Finished => "finished",
            RunOutcome::Terminated => "terminated",
        });
        Self {
            outcome,
            root: JsonNode::new(tree, tree.root()),
        }
    }
}

impl<'a> JsonNode<'a> {
    fn new(tree: &'a ResultTree, index: NodeIndex) -> Self {
        let node = tree.node(index);
        Self {
            id: node.id.map(|id| id.0),
            name: &node.name,
            kind: node.kind.as_str(),
            state: node.state().as_str(),
            terminated: node.is_terminated(),
            has_errors: node.has_errors(),
            duration_secs: node.duration.map(|d| d.as_secs_f64()),
            location: node.location.as_deref(),
            failure: node.failure.as_ref().map(|f| f.message.as_str()),
            ignore_reason: node.ignore_reason.as_deref(),
            output: node.output(),
            children: node
                .children()
                .iter()
                .map(|&child| JsonNode::new(tree, child))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use runtree::node::{NodeId, NodeKind, NodeState, ResultNode};

    #[test]
    fn serialize_tree() {
        let mut tree = ResultTree::new("root");
        let root = tree.root();
        let t = tree.add_child(root, ResultNode::new(Some(NodeId(1)), "t", NodeKind::Test));
        tree.node_mut(t).set_state(NodeState::Ignored).unwrap();
        tree.node_mut(t).ignore_reason = Some("slow".to_owned());

        let json = serde_json::to_value(JsonTree::new(&tree)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "outcome": null,
                "root": {
                    "id": 0,
                    "name": "root",
                    "kind": "suite",
                    "state": "not-running",
                    "children": [{
                        "id": 1,
                        "name": "t",
                        "kind": "test",
                        "state": "ignored",
                        "ignore-reason": "slow",
                    }],
                },
            })
        );
    }
}
