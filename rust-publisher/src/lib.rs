//! wabridge - WhatsApp webhook to Pub/Sub bridge.
//!
//! This library backs the `wabridge-web` binary:
//! - verifies the webhook subscription handshake
//! - validates inbound notifications against the Cloud API schema
//! - derives an idempotency key per notification
//! - publishes the payload to a Pub/Sub topic
//!
//! ## Architecture
//!
//! ```text
//! Meta → Web Server → validate → key → BatchingPublisher → Pub/Sub topic
//! ```

pub mod config;
pub mod event;
pub mod queue;
pub mod schema;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError, ServiceAccount};
pub use event::{derive_idempotency_key, validate_body, Envelope, IdempotencyKey};
pub use queue::{
    BatchingPublisher, EventPublisher, MemoryPublisher, OutboundMessage, PubSubClient,
    PublishError,
};
pub use web::{router, AppState};
