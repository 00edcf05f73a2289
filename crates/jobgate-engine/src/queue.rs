//! Notification sink for accepted jobs
//!
//! Publishing is fire-and-forget: the engine only waits for the sink to
//! accept the message, never for downstream processing.

use crate::error::{QueueError, QueueResult};
use crate::types::JobRecord;
use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::info;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Hand off one serialized job record
    async fn publish(&self, message: String) -> QueueResult<()>;
}

/// Serialize and publish a job record
pub async fn publish_job(sink: &dyn NotificationSink, record: &JobRecord) -> QueueResult<()> {
    let message = serde_json::to_string(record)?;
    sink.publish(message).await
}

/// Sink that forwards messages onto an in-process channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn publish(&self, message: String) -> QueueResult<()> {
        self.tx.send(message).map_err(|_| QueueError::Closed)
    }
}

/// Sink that only records the message in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, message: String) -> QueueResult<()> {
        info!(bytes = message.len(), "published job message");
        Ok(())
    }
}
