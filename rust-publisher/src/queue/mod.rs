//! Queue module for forwarding validated events.
//!
//! This module provides:
//! - Message and attribute types
//! - The `EventPublisher` seam used by the web handlers
//! - A batching publisher over the Pub/Sub REST transport
//! - An in-memory publisher
//!
//! ## Architecture
//!
//! ```text
//! Web Server → BatchingPublisher → PubSubClient → Pub/Sub topic
//! ```

pub mod batch;
pub mod memory;
pub mod publisher;
pub mod pubsub;
pub mod types;

pub use batch::{BatchSettings, BatchSink, BatchingPublisher};
pub use memory::MemoryPublisher;
pub use publisher::{EventPublisher, PublishError};
pub use pubsub::{Credentials, PubSubClient};
pub use types::{
    OutboundMessage, PublishAttributes, EVENT_TYPE_ATTRIBUTE, IDEMPOTENCY_KEY_ATTRIBUTE,
    WHATSAPP_EVENT_TYPE,
};
