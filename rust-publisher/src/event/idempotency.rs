//! Idempotency key derivation for published events.
//!
//! Only the first change of the first entry is inspected. The provider sends
//! one entry per delivery in practice, so multi-entry batches are not fully
//! deduplicated by this key.

use std::fmt;

use uuid::Uuid;

use super::types::Envelope;

/// Where a key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Id of the first message.
    Message,
    /// Id of the first status update.
    Status,
    /// Random id; the event cannot be deduplicated.
    Generated,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Message => "message",
            KeySource::Status => "status",
            KeySource::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    value: String,
    source: KeySource,
}

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Derive the key: first message id, else first status id, else a fresh UUID.
pub fn derive_idempotency_key(envelope: &Envelope) -> IdempotencyKey {
    let value = envelope.first_value();

    if let Some(message) = value.and_then(|v| v.messages.as_ref()?.first()) {
        return IdempotencyKey {
            value: message.id.clone(),
            source: KeySource::Message,
        };
    }

    if let Some(status) = value.and_then(|v| v.statuses.as_ref()?.first()) {
        return IdempotencyKey {
            value: status.id.clone(),
            source: KeySource::Status,
        };
    }

    IdempotencyKey {
        value: Uuid::new_v4().to_string(),
        source: KeySource::Generated,
    }
}
