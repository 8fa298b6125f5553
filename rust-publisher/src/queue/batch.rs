//! Coalescing publisher.
//!
//! Concurrent publish calls are gathered on a background task into batches
//! bounded by a message count and a time budget, then sent together. Each
//! caller still awaits its own message id, so batching is invisible to a
//! single caller apart from latency.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::publisher::{EventPublisher, PublishError};
use super::types::OutboundMessage;

/// Sends one batch and returns the ids in message order.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn send_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<String>, PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Flush once this many messages are waiting
    pub max_messages: usize,
    /// Flush once the oldest waiting message is this old
    pub max_delay: Duration,
}

/// Pub/Sub refuses publish requests carrying more messages than this.
pub const MAX_BATCH_MESSAGES: usize = 1000;

impl BatchSettings {
    /// Bring `max_messages` into `1..=MAX_BATCH_MESSAGES`.
    pub fn clamped(self) -> Self {
        let max_messages = self.max_messages.clamp(1, MAX_BATCH_MESSAGES);
        if max_messages != self.max_messages {
            warn!(
                requested = self.max_messages,
                used = max_messages,
                "batch_max_messages_out_of_range"
            );
        }
        Self {
            max_messages,
            ..self
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_messages: 100,
            max_delay: Duration::from_millis(1000),
        }
    }
}

struct Pending {
    message: OutboundMessage,
    reply: oneshot::Sender<Result<String, PublishError>>,
}

/// [`EventPublisher`] that batches messages into a [`BatchSink`].
pub struct BatchingPublisher {
    sender: Mutex<Option<mpsc::Sender<Pending>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl BatchingPublisher {
    /// Start the batching task. Must be called inside a Tokio runtime.
    pub fn new<S: BatchSink>(sink: S, settings: BatchSettings, timeout: Duration) -> Self {
        let settings = settings.clamped();
        let (sender, receiver) = mpsc::channel(settings.max_messages * 4);
        let worker = tokio::spawn(run_batches(Arc::new(sink), receiver, settings));

        info!(
            max_messages = settings.max_messages,
            max_delay_ms = settings.max_delay.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "batch_publisher_started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            timeout,
        }
    }

    /// Stop accepting messages and wait for waiting messages to be sent.
    pub async fn close(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "batch_publisher_worker_failed");
            }
        }

        info!("batch_publisher_closed");
    }
}

#[async_trait]
impl EventPublisher for BatchingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<String, PublishError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(PublishError::Closed)?;

        let (reply, response) = oneshot::channel();
        let work = async move {
            sender
                .send(Pending { message, reply })
                .await
                .map_err(|_| PublishError::Closed)?;
            // Only the publisher's own sender may keep the channel open, or
            // close() cannot end intake while callers are waiting.
            drop(sender);
            response.await.map_err(|_| PublishError::Closed)?
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "publish_timed_out");
                Err(PublishError::Timeout(self.timeout))
            }
        }
    }
}

async fn run_batches<S: BatchSink>(
    sink: Arc<S>,
    mut receiver: mpsc::Receiver<Pending>,
    settings: BatchSettings,
) {
    let mut in_flight = Vec::new();

    while let Some(first) = receiver.recv().await {
        let deadline = Instant::now() + settings.max_delay;
        let mut batch = vec![first];

        while batch.len() < settings.max_messages {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Some(pending)) => batch.push(pending),
                Ok(None) | Err(_) => break,
            }
        }

        in_flight.retain(|task: &JoinHandle<()>| !task.is_finished());
        in_flight.push(tokio::spawn(flush(sink.clone(), batch)));
    }

    for task in in_flight {
        let _ = task.await;
    }
}

async fn flush<S: BatchSink>(sink: Arc<S>, batch: Vec<Pending>) {
    let (messages, replies): (Vec<_>, Vec<_>) =
        batch.into_iter().map(|p| (p.message, p.reply)).unzip();

    let result = match sink.send_batch(&messages).await {
        Ok(ids) if ids.len() == messages.len() => Ok(ids),
        Ok(ids) => Err(PublishError::InvalidResponse(format!(
            "{} message ids for {} messages",
            ids.len(),
            messages.len()
        ))),
        Err(e) => Err(e),
    };

    match result {
        Ok(ids) => {
            info!(batch_size = ids.len(), "batch_flushed");
            for (reply, id) in replies.into_iter().zip(ids) {
                // The caller may have timed out and gone away.
                let _ = reply.send(Ok(id));
            }
        }
        Err(e) => {
            warn!(batch_size = replies.len(), error = %e, "batch_flush_failed");
            for reply in replies {
                let _ = reply.send(Err(e.clone()));
            }
        }
    }
}
