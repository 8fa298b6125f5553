//! Inbound event model and the validate → key pipeline stages.
//!
//! ```text
//! raw body → validate_body() → Envelope → derive_idempotency_key() → publish
//! ```

pub mod idempotency;
pub mod types;
pub mod validate;

pub use idempotency::{derive_idempotency_key, IdempotencyKey, KeySource};
pub use types::{Envelope, MessageType, WEBHOOK_OBJECT};
pub use validate::{validate_body, validate_payload, ValidationFailure};
