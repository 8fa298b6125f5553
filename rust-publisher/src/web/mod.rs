//! Web server module for the WhatsApp webhook.
//!
//! This module provides the HTTP surface:
//! - `GET /webhook` answers the subscription handshake
//! - `POST /webhook` validates, keys, and publishes notifications
//! - `GET /healthz` for liveness probes

pub mod handlers;
pub mod handshake;
pub mod signature;

pub use handlers::{router, AppState, ErrorResponse, PublishedResponse};
pub use handshake::{check_handshake, HandshakeOutcome, HandshakeQuery};
pub use signature::verify_hub_signature;
