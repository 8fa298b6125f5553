//! Subscription verification handshake.
//!
//! During webhook setup the provider calls `GET /webhook` with `hub.mode`,
//! `hub.verify_token` and `hub.challenge`. The challenge is echoed back only
//! when the mode is `subscribe` and the token equals the configured secret
//! exactly.

use tracing::{info, warn};

use super::signature::constant_time_compare;

pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Handshake query parameters. Any of them may be missing.
#[derive(Debug, Clone, Default)]
pub struct HandshakeQuery {
    pub mode: Option<String>,
    pub verify_token: Option<String>,
    pub challenge: Option<String>,
    /// `hub.*` parameters sent more than once. Such a handshake never matches.
    pub repeated: Vec<String>,
}

impl HandshakeQuery {
    /// Collect the `hub.*` parameters from raw query pairs. Other keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = HandshakeQuery::default();

        for (name, value) in pairs {
            let slot = match name.as_str() {
                "hub.mode" => &mut query.mode,
                "hub.verify_token" => &mut query.verify_token,
                "hub.challenge" => &mut query.challenge,
                _ => continue,
            };

            if slot.is_some() {
                if !query.repeated.contains(&name) {
                    query.repeated.push(name);
                }
            } else {
                *slot = Some(value);
            }
        }

        query
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Respond with the challenge verbatim.
    Verified { challenge: String },
    Rejected,
}

/// Check the handshake against the configured secret.
///
/// No normalization is applied: an empty secret matches only an explicitly
/// empty received token. The secret itself is never logged.
pub fn check_handshake(expected_token: &str, query: &HandshakeQuery) -> HandshakeOutcome {
    let unambiguous = query.repeated.is_empty();
    let mode_ok = query.mode.as_deref() == Some(SUBSCRIBE_MODE);
    let token_ok = query
        .verify_token
        .as_deref()
        .is_some_and(|token| constant_time_compare(token, expected_token));

    if unambiguous && mode_ok && token_ok {
        info!("webhook_verified");
        HandshakeOutcome::Verified {
            challenge: query.challenge.clone().unwrap_or_default(),
        }
    } else {
        warn!(
            mode = ?query.mode,
            token = ?query.verify_token,
            repeated = ?query.repeated,
            "webhook_verification_failed"
        );
        HandshakeOutcome::Rejected
    }
}
