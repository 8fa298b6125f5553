//! Webhook payload signature verification.
//!
//! When an app secret is configured, Meta signs each POST body with
//! HMAC-SHA256 and sends `X-Hub-Signature-256: sha256=<hex digest>`.
//! Reference: https://developers.facebook.com/docs/graph-api/webhooks/getting-started#validate-payloads

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify the signature header against the raw request body.
///
/// # Arguments
///
/// * `app_secret` - The app secret from the Meta developer console
/// * `body` - The raw, unparsed request body
/// * `signature_header` - The `X-Hub-Signature-256` header value, if sent
///
/// # Returns
///
/// `true` if the header carries the expected digest, `false` otherwise.
pub fn verify_hub_signature(app_secret: &str, body: &[u8], signature_header: Option<&str>) -> bool {
    let header = match signature_header {
        Some(h) if !h.is_empty() => h,
        _ => {
            warn!("hub_signature_missing");
            return false;
        }
    };

    let provided = match header.strip_prefix(SIGNATURE_PREFIX) {
        Some(hex_digest) => hex_digest.to_ascii_lowercase(),
        None => {
            warn!("hub_signature_bad_prefix");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("hub_signature_invalid_key");
            return false;
        }
    };

    mac.update(body);

    let expected = hex::encode(mac.finalize().into_bytes());

    let valid = constant_time_compare(&expected, &provided);

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = provided.len(),
            "hub_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Only the length difference leaks; contents are compared in full.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
