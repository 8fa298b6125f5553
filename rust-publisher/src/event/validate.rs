//! Payload validation: raw body → normalized [`Envelope`] or a diagnostic bundle.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::types::{Envelope, WEBHOOK_OBJECT};
use crate::schema::shape::json_type_name;
use crate::schema::{FieldPath, Violation, ViolationKind, WEBHOOK};

/// A payload that failed validation.
///
/// Carries every violation plus the raw payload and its top-level keys, since
/// provider schema drift is the usual cause and needs the full picture.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
    pub payload: Value,
    pub payload_keys: Vec<String>,
}

impl ValidationFailure {
    fn new(violations: Vec<Violation>, payload: Value) -> Self {
        let payload_keys = payload
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();

        Self {
            violations,
            payload,
            payload_keys,
        }
    }

    /// JSON type of the rejected payload.
    pub fn payload_type(&self) -> &'static str {
        json_type_name(&self.payload)
    }

    /// One-line description of every violation, in discovery order.
    pub fn message(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Flattened violation summary.
    ///
    /// `formErrors` holds root-level problems, `fieldErrors` maps each dotted
    /// path to its messages.
    pub fn details(&self) -> Value {
        let mut form_errors = Vec::new();
        let mut field_errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for violation in &self.violations {
            if violation.path.is_root() {
                form_errors.push(violation.kind.to_string());
            } else {
                field_errors
                    .entry(violation.path.to_string())
                    .or_default()
                    .push(violation.kind.to_string());
            }
        }

        json!({
            "formErrors": form_errors,
            "fieldErrors": field_errors,
        })
    }
}

/// Parse a request body and validate it.
///
/// A body that is not JSON is reported like any other schema violation.
pub fn validate_body(body: &[u8]) -> Result<Envelope, ValidationFailure> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => validate_payload(value),
        Err(e) => {
            let failure = ValidationFailure::new(
                vec![Violation::new(
                    FieldPath::root(),
                    ViolationKind::Unparseable(e.to_string()),
                )],
                Value::String(String::from_utf8_lossy(body).into_owned()),
            );
            log_failure(&failure);
            Err(failure)
        }
    }
}

/// Validate an already parsed payload against the webhook schema.
pub fn validate_payload(payload: Value) -> Result<Envelope, ValidationFailure> {
    if let Err(violations) = WEBHOOK.check(&payload) {
        let failure = ValidationFailure::new(violations, payload);
        log_failure(&failure);
        return Err(failure);
    }

    // The shape check accepted every declared field, so this only fails if the
    // typed model and the shapes disagree.
    let envelope: Envelope = match serde_json::from_value(payload.clone()) {
        Ok(envelope) => envelope,
        Err(e) => {
            let failure = ValidationFailure::new(
                vec![Violation::new(
                    FieldPath::root(),
                    ViolationKind::Unparseable(e.to_string()),
                )],
                payload,
            );
            log_failure(&failure);
            return Err(failure);
        }
    };

    if envelope.object != WEBHOOK_OBJECT {
        warn!(
            object = %envelope.object,
            expected = WEBHOOK_OBJECT,
            "webhook_unexpected_object"
        );
    }

    let message_types: Vec<&str> = envelope.message_types().iter().map(|t| t.as_str()).collect();
    info!(
        entry_count = envelope.entry.len(),
        message_types = ?message_types,
        has_statuses = envelope.has_statuses(),
        "webhook_validated"
    );

    Ok(envelope)
}

fn log_failure(failure: &ValidationFailure) {
    let violations: Vec<String> = failure.violations.iter().map(|v| v.to_string()).collect();
    error!(
        violations = ?violations,
        received_payload = %failure.payload,
        payload_type = failure.payload_type(),
        payload_keys = ?failure.payload_keys,
        "webhook_validation_failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::{DeliveryState, MessageType};

    fn status_body(status: &str) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "metadata": {"display_phone_number": "1", "phone_number_id": "2"},
                "statuses": [{
                    "id": "stat-1",
                    "status": status,
                    "timestamp": "1700000000",
                    "recipient_id": "15551234567",
                    "pricing": {"billable": true, "category": "service", "pricing_model": "PMP"},
                    "conversation": {"id": "c", "origin": {"type": "service"}}
                }]
            }}]}]
        })
    }

    #[test]
    fn test_valid_status_payload() {
        let envelope = validate_payload(status_body("delivered")).unwrap();
        let status = &envelope.first_value().unwrap().statuses.as_ref().unwrap()[0];
        assert_eq!(status.status, DeliveryState::Delivered);
        assert!(status.pricing.as_ref().unwrap().billable);
    }

    #[test]
    fn test_invalid_status_names_path() {
        let failure = validate_payload(status_body("queued")).unwrap_err();
        let details = failure.details();
        let messages = &details["fieldErrors"]["entry.0.changes.0.value.statuses.0.status"];
        assert_eq!(
            messages[0],
            "Invalid enum value. Expected 'sent' | 'delivered' | 'read' | 'failed', received 'queued'"
        );
        assert_eq!(failure.payload_keys, vec!["entry", "object"]);
    }

    #[test]
    fn test_empty_object_lists_object_and_entry() {
        let failure = validate_payload(json!({})).unwrap_err();
        let details = failure.details();
        assert_eq!(details["fieldErrors"]["object"], json!(["Required"]));
        assert_eq!(details["fieldErrors"]["entry"], json!(["Required"]));
        assert_eq!(details["formErrors"], json!([]));
        assert!(failure.payload_keys.is_empty());
        assert_eq!(failure.payload_type(), "object");
    }

    #[test]
    fn test_null_body_is_form_error() {
        let failure = validate_payload(Value::Null).unwrap_err();
        assert_eq!(
            failure.details()["formErrors"],
            json!(["Expected object, received null"])
        );
        assert_eq!(failure.payload_type(), "null");
    }

    #[test]
    fn test_malformed_json_body() {
        let failure = validate_body(b"{not json").unwrap_err();
        assert_eq!(failure.violations.len(), 1);
        assert_eq!(failure.violations[0].code(), "invalid_json");
        assert!(failure.details()["formErrors"][0]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON"));
    }

    #[test]
    fn test_body_with_every_message_subtype() {
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
                "messaging_product": "whatsapp",
                "metadata": {"display_phone_number": "1", "phone_number_id": "2"},
                "messages": [
                    {"id": "a", "from": "3", "timestamp": "4", "type": "location",
                     "location": {"latitude": 40.4, "longitude": -3.7, "name": "Sol"}},
                    {"id": "b", "from": "3", "timestamp": "4", "type": "contacts",
                     "contacts": [{"name": {"formatted_name": "Ana"}, "phones": [{"phone": "+1"}]}]},
                    {"id": "c", "from": "3", "timestamp": "4", "type": "interactive",
                     "interactive": {"type": "list_reply", "list_reply": {"id": "r", "title": "Row"}}},
                    {"id": "d", "from": "3", "timestamp": "4", "type": "order",
                     "order": {"catalog_id": "cat", "product_items": [
                         {"product_retailer_id": "p", "quantity": "1", "item_price": "9.99", "currency": "EUR"}]}},
                    {"id": "e", "from": "3", "timestamp": "4", "type": "system",
                     "system": {"body": "changed", "type": "customer_changed_number", "new_wa_id": "5"}},
                    {"id": "f", "from": "3", "timestamp": "4", "type": "audio",
                     "audio": {"id": "v", "mime_type": "audio/ogg; codecs=opus"},
                     "context": {"from": "6", "id": "wamid.prev", "forwarded": true}},
                    {"id": "g", "from": "3", "timestamp": "4", "type": "unknown",
                     "errors": [{"code": 131051, "title": "Unsupported message type",
                                 "error_data": {"details": "not supported"}}]}
                ]
            }}]}]
        });

        let envelope = validate_payload(body).unwrap();
        assert_eq!(
            envelope.message_types(),
            vec![
                MessageType::Location,
                MessageType::Contacts,
                MessageType::Interactive,
                MessageType::Order,
                MessageType::System,
                MessageType::Audio,
                MessageType::Unknown,
            ]
        );
    }
}
