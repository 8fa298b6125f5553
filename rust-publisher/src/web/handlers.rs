//! Webhook endpoint handlers.
//!
//! `POST /webhook` runs the whole pipeline inline:
//! 1. Verify the payload signature (if an app secret is configured)
//! 2. Validate the body against the webhook schema
//! 3. Derive the idempotency key
//! 4. Publish and return the queue-assigned id
//!
//! Nothing is persisted here; a failed publish is reported and dropped.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn, Level};

use crate::event::{derive_idempotency_key, validate_body};
use crate::queue::{EventPublisher, OutboundMessage, PublishError};
use crate::web::handshake::{check_handshake, HandshakeOutcome, HandshakeQuery};
use crate::web::signature::{verify_hub_signature, SIGNATURE_HEADER};
use crate::Config;

/// Publish failures are described to callers only in these words; the cause
/// stays in the logs.
pub const PUBLISH_FAILED_MESSAGE: &str = "Could not publish the message to Pub/Sub";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub publisher: Arc<dyn EventPublisher>,
}

impl AppState {
    pub fn new(config: Config, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            config: Arc::new(config),
            publisher,
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Response bodies
// =============================================================================

/// JSON error body. `error` is always present.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    fn new(error: &'static str) -> Self {
        Self {
            error,
            details: None,
            message: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublishedResponse {
    #[serde(rename = "messageId")]
    pub message_id: String,
}

// =============================================================================
// Health Check
// =============================================================================

pub async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// Verification handshake
// =============================================================================

/// `GET /webhook`: echo the challenge when mode and token match.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = HandshakeQuery::from_pairs(pairs);
    match check_handshake(&state.config.verify_token, &query) {
        HandshakeOutcome::Verified { challenge } => (StatusCode::OK, challenge).into_response(),
        HandshakeOutcome::Rejected => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Invalid verification token")),
        )
            .into_response(),
    }
}

// =============================================================================
// Event intake
// =============================================================================

/// `POST /webhook`: validate, key, and publish one notification.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if tracing::enabled!(Level::DEBUG) {
        let raw = String::from_utf8_lossy(&body);
        debug!(body = %raw, body_length = body.len(), "webhook_received");
    }

    if let Some(app_secret) = &state.config.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());

        if !verify_hub_signature(app_secret, &body, signature) {
            warn!(has_signature = signature.is_some(), "webhook_signature_invalid");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Invalid signature")),
            )
                .into_response();
        }
    }

    let envelope = match validate_body(&body) {
        Ok(envelope) => envelope,
        Err(failure) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Invalid body",
                    details: Some(failure.details()),
                    message: Some(failure.message()),
                }),
            )
                .into_response();
        }
    };

    let key = derive_idempotency_key(&envelope);

    let result = match OutboundMessage::from_envelope(&envelope, &key) {
        Ok(message) => state.publisher.publish(message).await,
        Err(e) => Err(PublishError::Serialization(e.to_string())),
    };

    match result {
        Ok(message_id) => {
            info!(
                message_id = %message_id,
                idempotency_key = %key,
                key_source = key.source().as_str(),
                "webhook_published"
            );
            (
                StatusCode::ACCEPTED,
                Json(PublishedResponse { message_id }),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, idempotency_key = %key, "webhook_publish_failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to publish message",
                    details: None,
                    message: Some(PUBLISH_FAILED_MESSAGE.to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    error!(panic = %detail, "request_panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{
        BatchSettings, BatchingPublisher, Credentials, MemoryPublisher, PubSubClient,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;
    use std::time::Duration;
    use tower::ServiceExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(app_secret: Option<&str>) -> Config {
        Config {
            port: 0,
            verify_token: "s3cret".into(),
            project_id: "demo".into(),
            topic_id: "events".into(),
            app_secret: app_secret.map(String::from),
            pubsub_emulator_host: None,
            service_account: None,
            publish_timeout: Duration::from_secs(5),
            batch_max_messages: 100,
            batch_max_delay: Duration::from_millis(1000),
        }
    }

    fn app_with(publisher: Arc<dyn EventPublisher>, app_secret: Option<&str>) -> Router {
        router(AppState::new(test_config(app_secret), publisher))
    }

    fn text_body() -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15550783881",
                            "phone_number_id": "106540352242922"
                        },
                        "contacts": [{"profile": {"name": "Sheena"}, "wa_id": "16505551234"}],
                        "messages": [{
                            "from": "16505551234",
                            "id": "wamid.ABC",
                            "timestamp": "1749416383",
                            "type": "text",
                            "text": {"body": "hi"}
                        }]
                    }
                }]
            }]
        })
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(Arc::new(MemoryPublisher::new()), None);
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_handshake_echoes_challenge() {
        let app = app_with(Arc::new(MemoryPublisher::new()), None);
        let uri = "/webhook?hub.mode=subscribe&hub.verify_token=s3cret&hub.challenge=XYZ123";
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"XYZ123");
    }

    #[tokio::test]
    async fn test_handshake_rejects_wrong_token_or_mode() {
        for uri in [
            "/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=XYZ123",
            "/webhook?hub.mode=unsubscribe&hub.verify_token=s3cret&hub.challenge=XYZ123",
            "/webhook",
        ] {
            let app = app_with(Arc::new(MemoryPublisher::new()), None);
            let response = app
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
            let body = json_body(response).await;
            assert_eq!(body, json!({"error": "Invalid verification token"}));
        }
    }

    #[tokio::test]
    async fn test_handshake_with_repeated_mode_is_forbidden() {
        let app = app_with(Arc::new(MemoryPublisher::new()), None);
        let uri = "/webhook?hub.mode=subscribe&hub.mode=x&hub.verify_token=s3cret&hub.challenge=C";
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid verification token"})
        );
    }

    #[tokio::test]
    async fn test_text_message_is_published() {
        let publisher = MemoryPublisher::new();
        let app = app_with(Arc::new(publisher.clone()), None);

        let response = app.oneshot(post(text_body().to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await, json!({"messageId": "1"}));

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        let message = &published[0].1;
        assert_eq!(message.attributes.event_type(), Some("whatsapp"));
        assert_eq!(message.attributes.idempotency_key(), Some("wamid.ABC"));

        let data: Value = serde_json::from_slice(&message.data).unwrap();
        assert_eq!(
            data["entry"][0]["changes"][0]["value"]["messages"][0]["text"]["body"],
            "hi"
        );
    }

    #[tokio::test]
    async fn test_unknown_fields_are_forwarded() {
        let publisher = MemoryPublisher::new();
        let app = app_with(Arc::new(publisher.clone()), None);

        let mut body = text_body();
        body["entry"][0]["changes"][0]["value"]["messages"][0]["brand_new_field"] = json!({"x": 1});

        let response = app.oneshot(post(body.to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let data: Value = serde_json::from_slice(&publisher.published()[0].1.data).unwrap();
        assert_eq!(
            data["entry"][0]["changes"][0]["value"]["messages"][0]["brand_new_field"],
            json!({"x": 1})
        );
    }

    #[tokio::test]
    async fn test_empty_object_is_rejected() {
        let publisher = MemoryPublisher::new();
        let app = app_with(Arc::new(publisher.clone()), None);

        let response = app.oneshot(post("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid body");
        assert_eq!(body["details"]["fieldErrors"]["object"], json!(["Required"]));
        assert_eq!(body["details"]["fieldErrors"]["entry"], json!(["Required"]));
        assert!(body["message"].as_str().unwrap().contains("object: Required"));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let app = app_with(Arc::new(MemoryPublisher::new()), None);

        let response = app.oneshot(post("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Invalid body");
        assert_eq!(body["details"]["formErrors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_body_logged_only_under_debug() {
        let _guard = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .finish()
            .set_default();
        assert!(tracing::enabled!(Level::DEBUG));

        let app = app_with(Arc::new(MemoryPublisher::new()), None);
        let response = app.oneshot(post(vec![0xff, 0xfe, b'{'])).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_queue_is_500() {
        let publisher = MemoryPublisher::new();
        publisher.set_unreachable(true);
        let app = app_with(Arc::new(publisher.clone()), None);

        let response = app.oneshot(post(text_body().to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(
            body,
            json!({"error": "Failed to publish message", "message": PUBLISH_FAILED_MESSAGE})
        );

        // The next request is unaffected once the queue is back.
        publisher.set_unreachable(false);
        let app = app_with(Arc::new(publisher.clone()), None);
        let response = app.oneshot(post(text_body().to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_required_when_secret_configured() {
        let publisher = MemoryPublisher::new();
        let body = text_body().to_string();

        let app = app_with(Arc::new(publisher.clone()), Some("app-secret"));
        let response = app.oneshot(post(body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"error": "Invalid signature"}));

        let mut mac = Hmac::<Sha256>::new_from_slice(b"app-secret").unwrap();
        mac.update(body.as_bytes());
        let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        let mut request = post(body);
        request
            .headers_mut()
            .insert("X-Hub-Signature-256", signature.parse().unwrap());

        let app = app_with(Arc::new(publisher.clone()), Some("app-secret"));
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(publisher.published().len(), 1);
    }

    struct PanickingPublisher;

    #[async_trait]
    impl EventPublisher for PanickingPublisher {
        async fn publish(&self, _message: OutboundMessage) -> Result<String, PublishError> {
            panic!("publisher exploded");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let app = app_with(Arc::new(PanickingPublisher), None);

        let response = app.oneshot(post(text_body().to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "Internal server error"}));
    }

    fn pubsub_publisher(server: &MockServer) -> Arc<BatchingPublisher> {
        let client = PubSubClient::new(
            &server.uri(),
            "secret-project-42",
            "events",
            Credentials::None,
            Duration::from_secs(5),
        )
        .unwrap();
        let settings = BatchSettings {
            max_messages: 10,
            max_delay: Duration::from_millis(5),
        };
        Arc::new(BatchingPublisher::new(client, settings, Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_published_through_pubsub() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/secret-project-42/topics/events:publish"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"messageIds": ["srv-17"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = app_with(pubsub_publisher(&server), None);
        let response = app.oneshot(post(text_body().to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await, json!({"messageId": "srv-17"}));

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let message = &sent["messages"][0];
        assert_eq!(
            message["attributes"],
            json!({"eventType": "whatsapp", "idempotencyKey": "wamid.ABC"})
        );

        let data = BASE64
            .decode(message["data"].as_str().unwrap())
            .unwrap();
        let forwarded: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(forwarded, text_body());
    }

    #[tokio::test]
    async fn test_missing_topic_does_not_leak_to_caller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Resource not found"))
            .mount(&server)
            .await;

        let app = app_with(pubsub_publisher(&server), None);
        let response = app.oneshot(post(text_body().to_string())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("secret-project-42"));
        assert!(!text.contains("not found"));
        assert_eq!(
            serde_json::from_str::<Value>(&text).unwrap(),
            json!({"error": "Failed to publish message", "message": PUBLISH_FAILED_MESSAGE})
        );
    }
}
