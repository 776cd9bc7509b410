//! Button-press webhook.
//!
//! Every toggle of today's bit is reported once, fire-and-forget:
//!
//! ```text
//!   POST <webhook_url>
//!   Content-Type: application/json
//!   X-HMAC-Signature: <64 lowercase hex>        (only when the key exists)
//!
//!   {"mac":"AA:BB:CC:DD:EE:FF","state":true,"date":"2025-01-01","timestamp":1735689600}
//! ```
//!
//! The signature is HMAC-SHA256 over the exact body bytes sent.  There is
//! no retry: a failed POST is logged and dropped.

use core::fmt::Write;
use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;

use super::ports::{HttpClientPort, HttpRequest, Method, NetError, SignerPort};

pub const SIGNATURE_HEADER: &str = "X-HMAC-Signature";

/// Field order is part of the signed byte sequence.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    mac: &'a str,
    state: bool,
    date: &'a str,
    timestamp: i64,
}

/// Result of one webhook attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No station link; nothing was sent.
    Skipped,
    /// The endpoint answered (any status).
    Delivered { status: u16, signed: bool },
    /// Transport failure.
    Failed(NetError),
}

/// Serialise the payload exactly as it is signed and sent.
pub fn build_payload(mac: &str, state: bool, date: &str, timestamp: i64) -> Vec<u8> {
    let payload = WebhookPayload {
        mac,
        state,
        date,
        timestamp,
    };
    // Serialising plain strings, a bool and an integer cannot fail.
    serde_json::to_vec(&payload).unwrap_or_default()
}

/// Lowercase hex encoding of a 32-byte MAC.
pub fn signature_hex(mac: &[u8; 32]) -> String {
    let mut hex = String::with_capacity(64);
    for b in mac {
        let _ = write!(hex, "{:02x}", b);
    }
    hex
}

pub struct WebhookDispatcher {
    url: String,
    timeout: Duration,
    mac: String,
    signing: bool,
}

impl WebhookDispatcher {
    /// `signing` is the boot-time check result of the HMAC key.
    pub fn new(url: &str, timeout_ms: u32, mac: &str, signing: bool) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_millis(u64::from(timeout_ms)),
            mac: mac.into(),
            signing,
        }
    }

    pub fn signing_enabled(&self) -> bool {
        self.signing
    }

    /// Report `state` for `date` / `timestamp`.  `link_up` is the station
    /// link status; without it the call is a logged no-op.
    pub fn send(
        &self,
        state: bool,
        link_up: bool,
        date: &str,
        timestamp: i64,
        http: &mut impl HttpClientPort,
        signer: &mut impl SignerPort,
    ) -> DeliveryOutcome {
        if !link_up {
            warn!("Webhook skipped - WiFi not connected");
            return DeliveryOutcome::Skipped;
        }

        let body = build_payload(&self.mac, state, date, timestamp);

        let signature = if self.signing {
            match signer.sign(&body) {
                Ok(mac) => Some(signature_hex(&mac)),
                Err(e) => {
                    error!("Webhook: HMAC calculation failed ({}), sending unsigned", e);
                    None
                }
            }
        } else {
            None
        };

        let mut headers: Vec<(&str, &str)> = vec![("Content-Type", "application/json")];
        if let Some(sig) = signature.as_deref() {
            headers.push((SIGNATURE_HEADER, sig));
        }

        info!(
            "Webhook: sending state={} date={} ({})",
            state,
            date,
            if signature.is_some() { "signed" } else { "unsigned" }
        );

        let request = HttpRequest {
            method: Method::Post,
            url: &self.url,
            headers: &headers,
            body: &body,
            timeout: self.timeout,
        };

        match http.execute(&request) {
            Ok(resp) => {
                info!("Webhook: HTTP {}", resp.status);
                DeliveryOutcome::Delivered {
                    status: resp.status,
                    signed: signature.is_some(),
                }
            }
            Err(e) => {
                error!("Webhook: request failed ({})", e);
                DeliveryOutcome::Failed(e)
            }
        }
    }
}
