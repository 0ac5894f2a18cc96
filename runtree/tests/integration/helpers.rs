// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use runtree::{
    config::ConvertorConfig, convertor::EventConvertor, events::TreeEvent,
    listener::ListenerRegistry, listeners::RunStats, node::NodeState, tree::ResultTree,
};
use std::sync::Arc;

/// A convertor wired to a fresh `RunStats` listener.
pub(crate) fn convertor_with_stats(strict: bool) -> (EventConvertor, Arc<RunStats>) {
    let stats = Arc::new(RunStats::new());
    let listeners = ListenerRegistry::new();
    listeners.add(stats.clone());
    (
        EventConvertor::new(ConvertorConfig { strict }, listeners),
        stats,
    )
}

pub(crate) fn apply_all(convertor: &mut EventConvertor, events: impl IntoIterator<Item = TreeEvent>) {
    for event in events {
        convertor.apply(event).expect("event applied");
    }
}

/// Returns `(name, state)` for every node below the root, in pre-order.
pub(crate) fn flatten(tree: &ResultTree) -> Vec<(String, NodeState)> {
    tree.iter()
        .skip(1)
        .map(|index| {
            let node = tree.node(index);
            (node.name.to_string(), node.state())
        })
        .collect()
}
