//! Downstream delivery of completed tasks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::TaskBatch;

/// Receives one batch per completed (or skipped) task.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, batch: TaskBatch);
}

/// Forwards batches into an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TaskBatch>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TaskBatch>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end, with room for `buffer` batches.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<TaskBatch>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn deliver(&self, batch: TaskBatch) {
        let task_id = batch.task_id;
        if self.tx.send(batch).await.is_err() {
            warn!("Result receiver dropped; batch {} discarded", task_id);
        }
    }
}
