//! Captive portal routes.
//!
//! | Method | Path                         | Response                                   |
//! |--------|------------------------------|--------------------------------------------|
//! | GET    | `/`                          | configuration page                         |
//! | GET    | `/api/scan`                  | `{"networks":[{ssid,rssi,auth}]}` (≤ 20)   |
//! | POST   | `/api/connect`               | `{success, claim_code}` / `{success, error}` |
//! | POST   | `/api/reset`                 | `{"success":true}`, restart follows        |
//! | GET    | OS check paths, anything else| 302 → portal root                          |
//!
//! The router is transport-agnostic: it takes a parsed [`Request`] and a
//! [`PortalBackend`] and returns a [`Response`].  The backend in
//! production is the [`PortalBridge`](super::bridge::PortalBridge).

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::http::{Request, Response};
use super::{ScanEntry, WifiCredentials, rssi_bucket};

/// Static configuration page.
pub const PORTAL_PAGE: &str = include_str!("../../assets/portal.html");

/// Connectivity-check URLs of Android, Apple and Windows.
pub const CONNECTIVITY_CHECK_PATHS: [&str; 4] = [
    "/generate_204",
    "/hotspot-detect.html",
    "/ncsi.txt",
    "/connecttest.txt",
];

pub const MAX_SCAN_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { claim_code: String },
    Failed,
}

/// Operations the portal delegates to whoever owns the radio and storage.
#[allow(async_fn_in_trait)]
pub trait PortalBackend {
    async fn scan(&self) -> Vec<ScanEntry>;

    async fn connect(&self, creds: WifiCredentials) -> ConnectOutcome;

    async fn factory_reset(&self);

    /// Called once the successful connect answer has been written out.
    fn connect_reply_written(&self) {}
}

// ───────────────────────────────────────────────────────────────
// JSON bodies
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConnectBody {
    #[serde(default)]
    ssid: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct ApiReply<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    claim_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> ApiReply<'a> {
    fn ok() -> Self {
        Self {
            success: true,
            claim_code: None,
            error: None,
        }
    }

    fn claimed(code: &'a str) -> Self {
        Self {
            success: true,
            claim_code: Some(code),
            error: None,
        }
    }

    fn failed(error: &'a str) -> Self {
        Self {
            success: false,
            claim_code: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
struct NetworkItem<'a> {
    ssid: &'a str,
    rssi: u8,
    auth: u8,
}

#[derive(Debug, Serialize)]
struct ScanReply<'a> {
    networks: Vec<NetworkItem<'a>>,
}

// ───────────────────────────────────────────────────────────────
// Router
// ───────────────────────────────────────────────────────────────

/// Dispatch one request.  `portal_url` is the redirect target for OS connectivity checks.
pub async fn route(req: &Request, backend: &impl PortalBackend, portal_url: &str) -> Response {
    let path = req.path.split('?').next().unwrap_or("");

    match (req.method.as_str(), path) {
        ("GET", "/") => Response::html(PORTAL_PAGE),
        ("GET", "/api/scan") => scan(backend).await,
        ("POST", "/api/connect") => connect(&req.body, backend).await,
        ("POST", "/api/reset") => {
            warn!("Portal: factory reset requested");
            backend.factory_reset().await;
            Response::json(200, &ApiReply::ok())
        }
        ("GET", p) => {
            if CONNECTIVITY_CHECK_PATHS.contains(&p) {
                debug!("Portal: connectivity check {}", p);
            }
            Response::redirect(portal_url)
        }
        _ => Response::not_found(),
    }
}

async fn scan(backend: &impl PortalBackend) -> Response {
    let found = backend.scan().await;
    let networks: Vec<NetworkItem<'_>> = found
        .iter()
        .filter(|n| !n.ssid.is_empty())
        .take(MAX_SCAN_RESULTS)
        .map(|n| NetworkItem {
            ssid: &n.ssid,
            rssi: rssi_bucket(n.rssi),
            auth: n.auth.code(),
        })
        .collect();
    info!("Portal: scan found {} network(s)", networks.len());
    Response::json(200, &ScanReply { networks })
}

async fn connect(body: &[u8], backend: &impl PortalBackend) -> Response {
    let Ok(body) = serde_json::from_slice::<ConnectBody>(body) else {
        return Response::json(400, &ApiReply::failed("Invalid request"));
    };

    let creds = match WifiCredentials::new(&body.ssid, &body.password) {
        Ok(c) => c,
        Err(e) => {
            let msg = e.to_string();
            return Response::json(200, &ApiReply::failed(&msg));
        }
    };

    info!("Portal: connecting to '{}'", creds.ssid());
    match backend.connect(creds).await {
        ConnectOutcome::Connected { claim_code } => {
            let mut resp = Response::json(200, &ApiReply::claimed(&claim_code));
            resp.completes_provisioning = true;
            resp
        }
        ConnectOutcome::Failed => {
            Response::json(200, &ApiReply::failed("Failed to connect to network"))
        }
    }
}
