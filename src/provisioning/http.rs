//! Minimal HTTP/1.1 server for the captive portal.
//!
//! One connection at a time, one request per connection, `Connection:
//! close` on every answer.  Requests are parsed from a bounded buffer:
//!
//! | Limit            | Value  | Exceeded →                  |
//! |------------------|--------|-----------------------------|
//! | request head     | 1024 B | 431                         |
//! | body             | 256 B  | 413                         |
//! | read deadline    | 5 s    | 408, connection closed      |
//! | backend deadline | 30 s   | 503                         |
//!
//! Parsing is a pure function so it can be fuzzed without sockets.

use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use async_io_mini::{Async, Timer};
use futures_lite::future;
use log::{debug, info, warn};
use serde::Serialize;

use super::portal::{PortalBackend, route};

pub const MAX_HEAD: usize = 1024;
pub const MAX_BODY: usize = 256;

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target as sent, query string included.
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Need more bytes.
    Incomplete,
    Malformed,
    HeadTooLarge,
    BodyTooLarge,
}

/// Parse one request from the start of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Err(if buf.len() > MAX_HEAD {
            ParseError::HeadTooLarge
        } else {
            ParseError::Incomplete
        });
    };
    if head_end > MAX_HEAD {
        return Err(ParseError::HeadTooLarge);
    }

    let head = core::str::from_utf8(&buf[..head_end]).map_err(|_| ParseError::Malformed)?;
    let mut lines = head.split("\r\n");

    let mut request_line = lines.next().unwrap_or("").split(' ');
    let (Some(method), Some(path), Some(version), None) = (
        request_line.next(),
        request_line.next(),
        request_line.next(),
        request_line.next(),
    ) else {
        return Err(ParseError::Malformed);
    };
    if method.is_empty() || !path.starts_with('/') || !version.starts_with("HTTP/1.") {
        return Err(ParseError::Malformed);
    }

    let mut content_length = 0usize;
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(ParseError::Malformed)?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse().map_err(|_| ParseError::Malformed)?;
        }
    }
    if content_length > MAX_BODY {
        return Err(ParseError::BodyTooLarge);
    }

    let body_start = head_end + 4;
    let body = buf
        .get(body_start..body_start + content_length)
        .ok_or(ParseError::Incomplete)?;

    Ok(Request {
        method: method.to_owned(),
        path: path.to_owned(),
        body: body.to_vec(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub location: Option<String>,
    /// Set on the successful `/api/connect` answer.
    pub completes_provisioning: bool,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            location: None,
            completes_provisioning: false,
        }
    }

    pub fn html(page: &str) -> Self {
        Self::new(200, "text/html", page.as_bytes().to_vec())
    }

    pub fn json(status: u16, value: &impl Serialize) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status, "application/json", body)
    }

    pub fn text(status: u16, msg: &str) -> Self {
        Self::new(status, "text/plain", msg.as_bytes().to_vec())
    }

    pub fn redirect(location: &str) -> Self {
        let mut resp = Self::new(302, "text/plain", Vec::new());
        resp.location = Some(location.to_owned());
        resp
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        );
        if let Some(loc) = &self.location {
            out.push_str("Location: ");
            out.push_str(loc);
            out.push_str("\r\n");
        }
        out.push_str("Cache-Control: no-store\r\nConnection: close\r\n\r\n");

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

fn error_response(err: ParseError) -> Response {
    match err {
        ParseError::Incomplete => Response::text(408, "Request Timeout"),
        ParseError::Malformed => Response::text(400, "Bad Request"),
        ParseError::HeadTooLarge => Response::text(431, "Header Too Large"),
        ParseError::BodyTooLarge => Response::text(413, "Body Too Large"),
    }
}

// ───────────────────────────────────────────────────────────────
// Socket side
// ───────────────────────────────────────────────────────────────

/// Read until a full request parses, the peer closes, or a limit trips.
async fn read_request(stream: &Async<TcpStream>) -> Result<Request, ParseError> {
    let mut buf = Vec::with_capacity(MAX_HEAD);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = stream
            .read_with(|s| {
                let mut s = s;
                s.read(&mut chunk)
            })
            .await
            .map_err(|_| ParseError::Incomplete)?;
        if n == 0 {
            return Err(ParseError::Incomplete);
        }
        buf.extend_from_slice(&chunk[..n]);

        match parse_request(&buf) {
            Err(ParseError::Incomplete) if buf.len() <= MAX_HEAD + 4 + MAX_BODY => continue,
            Err(ParseError::Incomplete) => return Err(ParseError::HeadTooLarge),
            other => return other,
        }
    }
}

async fn write_all(stream: &Async<TcpStream>, bytes: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < bytes.len() {
        let n = stream
            .write_with(|s| {
                let mut s = s;
                s.write(&bytes[sent..])
            })
            .await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        sent += n;
    }
    Ok(())
}

async fn handle_connection(
    stream: Async<TcpStream>,
    backend: &impl PortalBackend,
    portal_url: &str,
) {
    let parsed = future::or(read_request(&stream), async {
        Timer::after(READ_TIMEOUT).await;
        Err(ParseError::Incomplete)
    })
    .await;

    let resp = match parsed {
        Ok(req) => {
            debug!("HTTP: {} {}", req.method, req.path);
            future::or(route(&req, backend, portal_url), async {
                Timer::after(REPLY_TIMEOUT).await;
                Response::text(503, "Busy")
            })
            .await
        }
        Err(e) => {
            debug!("HTTP: rejected request ({:?})", e);
            error_response(e)
        }
    };

    match write_all(&stream, &resp.encode()).await {
        Ok(()) => {
            if resp.completes_provisioning {
                backend.connect_reply_written();
            }
        }
        Err(e) => warn!("HTTP: write failed ({})", e),
    }
}

/// Serve connections on `listener` until the task is dropped.
pub async fn serve(listener: Async<TcpListener>, backend: &impl PortalBackend, portal_url: &str) {
    info!("HTTP: portal listening");
    loop {
        let (stream, peer) = match listener.read_with(|l| l.accept()).await {
            Ok(c) => c,
            Err(e) => {
                warn!("HTTP: accept failed ({})", e);
                continue;
            }
        };
        let stream = match Async::new(stream) {
            Ok(s) => s,
            Err(e) => {
                warn!("HTTP: cannot register {} ({})", peer, e);
                continue;
            }
        };
        handle_connection(stream, backend, portal_url).await;
    }
}
