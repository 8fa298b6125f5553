//! Queue message types.
//!
//! A published message is the UTF-8 JSON of a validated envelope plus string
//! attributes used by consumers for routing and deduplication.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::{Envelope, IdempotencyKey};

/// Attribute naming the event source.
pub const EVENT_TYPE_ATTRIBUTE: &str = "eventType";

/// Attribute carrying the deduplication key.
pub const IDEMPOTENCY_KEY_ATTRIBUTE: &str = "idempotencyKey";

/// Event type of WhatsApp notifications.
pub const WHATSAPP_EVENT_TYPE: &str = "whatsapp";

/// String attributes attached to a queue message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PublishAttributes(BTreeMap<String, String>);

impl PublishAttributes {
    /// Attributes with the mandatory `eventType`.
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(EVENT_TYPE_ATTRIBUTE.to_string(), event_type.into());
        Self(attributes)
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.0
            .insert(IDEMPOTENCY_KEY_ATTRIBUTE.to_string(), key.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.get(EVENT_TYPE_ATTRIBUTE)
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.get(IDEMPOTENCY_KEY_ATTRIBUTE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A message ready to hand to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// UTF-8 JSON payload
    pub data: Vec<u8>,
    pub attributes: PublishAttributes,
}

impl OutboundMessage {
    pub fn new(data: Vec<u8>, attributes: PublishAttributes) -> Self {
        Self { data, attributes }
    }

    /// Serialize a validated envelope, tagged as a WhatsApp event with its key.
    pub fn from_envelope(
        envelope: &Envelope,
        key: &IdempotencyKey,
    ) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_vec(envelope)?;
        let attributes =
            PublishAttributes::new(WHATSAPP_EVENT_TYPE).with_idempotency_key(key.as_str());
        Ok(Self::new(data, attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::derive_idempotency_key;
    use serde_json::json;

    #[test]
    fn test_attributes_serialize_as_flat_map() {
        let attributes = PublishAttributes::new("whatsapp").with_idempotency_key("wamid.ABC");
        assert_eq!(
            serde_json::to_value(&attributes).unwrap(),
            json!({"eventType": "whatsapp", "idempotencyKey": "wamid.ABC"})
        );
    }

    #[test]
    fn test_attributes_without_key() {
        let attributes = PublishAttributes::new("whatsapp");
        assert_eq!(attributes.event_type(), Some("whatsapp"));
        assert_eq!(attributes.idempotency_key(), None);
        assert_eq!(attributes.iter().count(), 1);
    }

    #[test]
    fn test_message_from_envelope() {
        let raw = json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "metadata": {"display_phone_number": "1", "phone_number_id": "2"},
                "messages": [{"id": "wamid.ABC", "from": "3", "timestamp": "4", "type": "text",
                              "text": {"body": "hi"}}]
            }}]}]
        });
        let envelope: Envelope = serde_json::from_value(raw.clone()).unwrap();
        let key = derive_idempotency_key(&envelope);

        let message = OutboundMessage::from_envelope(&envelope, &key).unwrap();

        assert_eq!(message.attributes.event_type(), Some(WHATSAPP_EVENT_TYPE));
        assert_eq!(message.attributes.idempotency_key(), Some("wamid.ABC"));
        let data: serde_json::Value = serde_json::from_slice(&message.data).unwrap();
        assert_eq!(data, raw);
    }
}
