//! In-process publisher that keeps messages in memory.
//!
//! Used to exercise the pipeline without a queue service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::publisher::{EventPublisher, PublishError};
use super::types::OutboundMessage;

#[derive(Clone, Default)]
pub struct MemoryPublisher {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    messages: Mutex<Vec<(String, OutboundMessage)>>,
    next_id: AtomicU64,
    unreachable: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail as if the queue were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Published messages with their ids, oldest first.
    pub fn published(&self) -> Vec<(String, OutboundMessage)> {
        self.inner
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<String, PublishError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(PublishError::Unreachable("memory queue offline".into()));
        }

        let id = (self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        self.inner
            .messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id.clone(), message));
        Ok(id)
    }
}
