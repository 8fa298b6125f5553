//! The publish seam between the HTTP pipeline and the queue.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::types::OutboundMessage;

/// Why a publish did not produce a queue message id.
///
/// Every variant is terminal for the request: nothing is retried locally,
/// redelivery is left to the provider's webhook retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("queue unreachable: {0}")]
    Unreachable(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("not authorized to publish: {0}")]
    Unauthorized(String),

    #[error("queue rejected publish with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected queue response: {0}")]
    InvalidResponse(String),

    #[error("failed to serialize message: {0}")]
    Serialization(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("publisher is closed")]
    Closed,
}

/// Hands messages to the queue and reports the queue-assigned id.
///
/// Implementations resolve only once the queue has accepted (or refused) the
/// message.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<String, PublishError>;
}
