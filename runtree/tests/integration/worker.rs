// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use pretty_assertions::assert_eq;
use runtree::{
    config::ConvertorConfig,
    convertor::EventConvertor,
    events::{FinishedNode, StartedNode, TreeEvent},
    listener::ListenerRegistry,
    listeners::RunStats,
    tree::RunOutcome,
    worker::EventWorker,
};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producers_on_other_tasks() {
    let stats = Arc::new(RunStats::new());
    let listeners = ListenerRegistry::new();
    listeners.add(stats.clone());
    let handle = EventWorker::spawn(EventConvertor::new(ConvertorConfig::STRICT, listeners));

    handle.send(TreeEvent::TestingStarted).unwrap();
    handle
        .send(TreeEvent::SuiteStarted(StartedNode::new(1, 0, "S")))
        .unwrap();

    // Each producer owns a disjoint range of ids.
    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let sender = handle.sender();
            tokio::spawn(async move {
                for i in 0..25 {
                    let id = 2 + producer * 25 + i;
                    sender
                        .send(TreeEvent::TestStarted(StartedNode::new(id, 1, format!("t{id}"))))
                        .unwrap();
                    sender
                        .send(TreeEvent::TestFinished(FinishedNode::new(id)))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.test_counts().passed, 100);

    handle
        .send(TreeEvent::SuiteFinished(FinishedNode::new(1)))
        .unwrap();
    handle.send(TreeEvent::TestingFinished).unwrap();
    let report = handle.finish().await.unwrap();

    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.tree.outcome(), Some(RunOutcome::Finished));
    assert_eq!(stats.summary().tests_passed, 100);
    assert!(stats.summary().testing_finished);
}
