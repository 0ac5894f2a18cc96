// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single-consumer event loop around an [`EventConvertor`].
//!
//! Producers on any task push events through an [`EventSender`]; one tokio task
//! owns the convertor and applies them in arrival order. Readers ask for
//! snapshots through the same channel, so a snapshot is always taken between
//! two events, never in the middle of one.

use crate::{
    convertor::EventConvertor,
    errors::{ConvertError, WorkerError},
    events::TreeEvent,
    tree::ResultTree,
};
use tokio::{
    sync::{
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{debug, error};

#[derive(Debug)]
enum WorkerRequest {
    Event(TreeEvent),
    Snapshot(oneshot::Sender<ResultTree>),
    Finish,
}

/// What the worker produced by the time it stopped.
#[derive(Debug)]
pub struct WorkerReport {
    /// The final tree.
    pub tree: ResultTree,
    /// Every error returned while applying events, in order.
    pub errors: Vec<ConvertError>,
}

/// Spawns the event loop.
#[derive(Debug)]
pub struct EventWorker {
    convertor: EventConvertor,
    errors: Vec<ConvertError>,
}

impl EventWorker {
    /// Spawns a task that owns `convertor` and returns a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(convertor: EventConvertor) -> WorkerHandle {
        let (tx, rx) = unbounded_channel();
        let worker = Self {
            convertor,
            errors: Vec::new(),
        };
        let join = tokio::spawn(worker.run(rx));
        WorkerHandle {
            sender: EventSender { tx },
            join,
        }
    }

    async fn run(mut self, mut rx: UnboundedReceiver<WorkerRequest>) -> WorkerReport {
        while let Some(request) = rx.recv().await {
            match request {
                WorkerRequest::Event(event) => self.apply(event),
                WorkerRequest::Snapshot(reply) => {
                    // The requester may have gone away; that's fine.
                    let _ = reply.send(self.convertor.snapshot());
                }
                WorkerRequest::Finish => {
                    debug!("event worker: finish requested");
                    break;
                }
            }
        }

        // Refuse anything sent from now on, but apply what is already queued.
        rx.close();
        while let Some(request) = rx.recv().await {
            match request {
                WorkerRequest::Event(event) => self.apply(event),
                WorkerRequest::Snapshot(reply) => {
                    let _ = reply.send(self.convertor.snapshot());
                }
                WorkerRequest::Finish => {}
            }
        }

        self.convertor.finish_testing();
        self.convertor.dispose();
        WorkerReport {
            tree: self.convertor.into_tree(),
            errors: self.errors,
        }
    }

    fn apply(&mut self, event: TreeEvent) {
        if let Err(error) = self.convertor.apply(event) {
            error!("failed to apply event: {error}");
            self.errors.push(error);
        }
    }
}

/// A cloneable handle for pushing events to a worker.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: UnboundedSender<WorkerRequest>,
}

impl EventSender {
    /// Queues an event. Fails once the worker has stopped accepting events.
    pub fn send(&self, event: TreeEvent) -> Result<(), WorkerError> {
        self.tx
            .send(WorkerRequest::Event(event))
            .map_err(|_| WorkerError::Closed)
    }
}

/// The owner's handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    sender: EventSender,
    join: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Returns a sender that can be handed to producers.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Queues an event.
    pub fn send(&self, event: TreeEvent) -> Result<(), WorkerError> {
        self.sender.send(event)
    }

    /// Returns a copy of the tree after every event queued so far has been
    /// applied.
    pub async fn snapshot(&self) -> Result<ResultTree, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .tx
            .send(WorkerRequest::Snapshot(reply_tx))
            .map_err(|_| WorkerError::Closed)?;
        reply_rx.await.map_err(|_| WorkerError::Closed)
    }

    /// Stops the worker once the queued events are applied, completes the
    /// run and returns the final tree.
    pub async fn finish(self) -> Result<WorkerReport, WorkerError> {
        // If the worker is already gone, the join below reports why.
        let _ = self.sender.tx.send(WorkerRequest::Finish);
        self.join.await.map_err(|error| {
            if error.is_panic() {
                WorkerError::Panicked
            } else {
                WorkerError::Closed
            }
        })
    }
}
