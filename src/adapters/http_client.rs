//! Outbound HTTP(S) client.
//!
//! Implements [`HttpClientPort`] for the timezone lookup and the webhook.
//! On ESP-IDF each request opens a fresh `EspHttpConnection` with the
//! request's timeout and the global certificate bundle.  On the host the
//! adapter has no network and reports [`NetError::NotConnected`].

use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, NetError};

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::{Method as SvcMethod, client::Client},
    io::{Read, Write},
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    http::client::{Configuration, EspHttpConnection},
    io::EspIOError,
};
#[cfg(target_os = "espidf")]
use log::debug;

#[cfg(target_os = "espidf")]
use crate::app::ports::Method;

/// Responses larger than this are truncated; both endpoints answer with
/// a few dozen bytes.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_RESPONSE_BYTES: usize = 2048;

#[cfg(target_os = "espidf")]
fn io_err(e: EspIOError) -> NetError {
    let code = e.0.code();
    if code == esp_idf_svc::sys::ESP_ERR_TIMEOUT {
        NetError::Timeout
    } else {
        NetError::Driver(code)
    }
}

#[derive(Default)]
pub struct HttpClientAdapter;

impl HttpClientAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl HttpClientPort for HttpClientAdapter {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, NetError> {
        let config = Configuration {
            timeout: Some(request.timeout),
            use_global_ca_store: true,
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection =
            EspHttpConnection::new(&config).map_err(|e| NetError::Driver(e.code()))?;
        let mut client = Client::wrap(connection);

        let length = request.body.len().to_string();
        let mut headers: Vec<(&str, &str)> = request.headers.to_vec();
        if !request.body.is_empty() {
            headers.push(("Content-Length", &length));
        }

        let method = match request.method {
            Method::Get => SvcMethod::Get,
            Method::Post => SvcMethod::Post,
        };
        let mut req = client
            .request(method, request.url, &headers)
            .map_err(io_err)?;
        if !request.body.is_empty() {
            req.write_all(request.body).map_err(io_err)?;
            req.flush().map_err(io_err)?;
        }
        let mut resp = req.submit().map_err(io_err)?;
        let status = resp.status();

        let mut body = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = resp.read(&mut buf).map_err(io_err)?;
            if n == 0 || body.len() >= MAX_RESPONSE_BYTES {
                break;
            }
            body.extend_from_slice(&buf[..n]);
        }
        body.truncate(MAX_RESPONSE_BYTES);

        debug!("HTTP client: {} -> {} ({} bytes)", request.url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpClientPort for HttpClientAdapter {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, NetError> {
        log::debug!("HTTP client(sim): no network for {}", request.url);
        Err(NetError::NotConnected)
    }
}
