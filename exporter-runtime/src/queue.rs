//! FIFO hand-off between the scheduler tick and job dispatch.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::runner::JobRunner;

/// Create an unbounded execution queue.
pub fn execution_queue() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSender { tx }, QueueReceiver { rx })
}

/// Producer side, held by the scheduler tick.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: UnboundedSender<Arc<JobRunner>>,
}

impl QueueSender {
    /// Enqueue a due job. Returns false if the receiver is gone.
    pub fn push(&self, job: Arc<JobRunner>) -> bool {
        self.tx.send(job).is_ok()
    }
}

/// Consumer side, held by the dispatcher.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: UnboundedReceiver<Arc<JobRunner>>,
}

impl QueueReceiver {
    /// Take everything currently queued, in arrival order, without waiting.
    pub fn drain(&mut self) -> Vec<Arc<JobRunner>> {
        let mut jobs = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(job) => jobs.push(job),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        jobs
    }
}
