//! Mock adapters for integration tests.
//!
//! Every mock records the calls it receives so tests can assert on the
//! full history without touching real radios, flash or GPIO.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use streak::adapters::hmac::HmacSigner;
use streak::app::events::AppEvent;
use streak::app::ports::{
    BoardPort, ClockPort, EventSink, HttpClientPort, HttpRequest, HttpResponse, Method, NetError,
    SignError, SignerPort, StorageError, StoragePort, StoredValue, WifiPort,
};
use streak::provisioning::link::{NetEvent, NetEventQueue, publish};
use streak::provisioning::{AccessPointConfig, AuthMode, ScanEntry, WifiCredentials};

// ── MockNvs ───────────────────────────────────────────────────

/// A typed entry as NVS keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    U8(u8),
    I32(i32),
    Str(String),
}

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Stored>,
    pub commits: usize,
    pub erased: Vec<String>,
    pub fail_writes: bool,
}

impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&Stored> {
        self.store.get(&format!("{}::{}", namespace, key))
    }

    pub fn put(&mut self, namespace: &str, key: &str, value: Stored) {
        self.store.insert(format!("{}::{}", namespace, key), value);
    }

    pub fn put_u8(&mut self, namespace: &str, key: &str, value: u8) {
        self.put(namespace, key, Stored::U8(value));
    }

    pub fn put_i32(&mut self, namespace: &str, key: &str, value: i32) {
        self.put(namespace, key, Stored::I32(value));
    }

    pub fn put_str(&mut self, namespace: &str, key: &str, value: &str) {
        self.put(namespace, key, Stored::Str(value.to_owned()));
    }

    pub fn namespace_empty(&self, namespace: &str) -> bool {
        let prefix = format!("{}::", namespace);
        !self.store.keys().any(|k| k.starts_with(&prefix))
    }
}

impl StoragePort for MockNvs {
    fn read_u8(&self, namespace: &str, key: &str) -> Result<u8, StorageError> {
        match self.get(namespace, key) {
            Some(Stored::U8(v)) => Ok(*v),
            _ => Err(StorageError::NotFound),
        }
    }

    fn read_i32(&self, namespace: &str, key: &str) -> Result<i32, StorageError> {
        match self.get(namespace, key) {
            Some(Stored::I32(v)) => Ok(*v),
            _ => Err(StorageError::NotFound),
        }
    }

    fn read_str(&self, namespace: &str, key: &str) -> Result<String, StorageError> {
        match self.get(namespace, key) {
            Some(Stored::Str(v)) => Ok(v.clone()),
            _ => Err(StorageError::NotFound),
        }
    }

    fn write_entries(
        &mut self,
        namespace: &str,
        entries: &[(&str, StoredValue<'_>)],
    ) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io(-1));
        }
        for (key, value) in entries {
            let value = match *value {
                StoredValue::U8(v) => Stored::U8(v),
                StoredValue::I32(v) => Stored::I32(v),
                StoredValue::Str(v) => Stored::Str(v.to_owned()),
            };
            self.put(namespace, key, value);
        }
        self.commits += 1;
        Ok(())
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let prefix = format!("{}::", namespace);
        self.store.retain(|k, _| !k.starts_with(&prefix));
        self.erased.push(namespace.to_owned());
        Ok(())
    }
}

// ── MockWifi ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiCall {
    StartStation(String),
    StartAccessPoint(String),
    ConfigureStation(String),
    Connect,
    Disconnect,
    Scan,
    StationOnly,
}

/// Simulated radio: networks in `accepted` associate (GotIp), anything
/// else disconnects straight away.
pub struct MockWifi {
    events: Arc<NetEventQueue>,
    station: Option<WifiCredentials>,
    pub accepted: Vec<(String, String)>,
    pub networks: Vec<ScanEntry>,
    pub calls: Vec<WifiCall>,
    /// Connect attempts produce no driver event at all.
    pub silent: bool,
}

impl MockWifi {
    pub fn new(events: Arc<NetEventQueue>) -> Self {
        Self {
            events,
            station: None,
            accepted: Vec::new(),
            networks: vec![
                ScanEntry::new("Home", -45, AuthMode::Wpa2Personal),
                ScanEntry::new("", -50, AuthMode::Open),
                ScanEntry::new("Cafe", -75, AuthMode::Open),
            ],
            calls: Vec::new(),
            silent: false,
        }
    }

    pub fn accepting(mut self, ssid: &str, password: &str) -> Self {
        self.accepted.push((ssid.to_owned(), password.to_owned()));
        self
    }

    pub fn connects(&self) -> usize {
        self.calls.iter().filter(|c| **c == WifiCall::Connect).count()
    }
}

impl WifiPort for MockWifi {
    fn start_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.calls.push(WifiCall::StartStation(creds.ssid().to_owned()));
        self.station = Some(creds.clone());
        publish(&self.events, NetEvent::StaStarted);
        Ok(())
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetError> {
        self.calls.push(WifiCall::StartAccessPoint(ap.ssid.clone()));
        Ok(())
    }

    fn configure_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.calls
            .push(WifiCall::ConfigureStation(creds.ssid().to_owned()));
        self.station = Some(creds.clone());
        Ok(())
    }

    fn connect(&mut self) -> Result<(), NetError> {
        self.calls.push(WifiCall::Connect);
        let Some(creds) = &self.station else {
            return Err(NetError::InvalidConfig);
        };
        if self.silent {
            return Ok(());
        }
        let ok = self
            .accepted
            .iter()
            .any(|(s, p)| s == creds.ssid() && p == creds.password());
        let event = if ok {
            NetEvent::GotIp(Ipv4Addr::new(192, 168, 1, 50))
        } else {
            NetEvent::StaDisconnected
        };
        publish(&self.events, event);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), NetError> {
        self.calls.push(WifiCall::Disconnect);
        Err(NetError::NotConnected)
    }

    fn scan(&mut self) -> Result<Vec<ScanEntry>, NetError> {
        self.calls.push(WifiCall::Scan);
        Ok(self.networks.clone())
    }

    fn set_station_only(&mut self) -> Result<(), NetError> {
        self.calls.push(WifiCall::StationOnly);
        Ok(())
    }
}

// ── MockHttp ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Answers GETs with `geo` and POSTs with `webhook`.
pub struct MockHttp {
    pub geo: Result<HttpResponse, NetError>,
    pub webhook: Result<HttpResponse, NetError>,
    pub requests: Vec<RecordedRequest>,
}

impl MockHttp {
    pub fn with_offset(offset_secs: i32) -> Self {
        Self {
            geo: Ok(HttpResponse {
                status: 200,
                body: format!("{{\"offset\":{}}}", offset_secs).into_bytes(),
            }),
            webhook: Ok(HttpResponse {
                status: 200,
                body: Vec::new(),
            }),
            requests: Vec::new(),
        }
    }

    pub fn offline() -> Self {
        Self {
            geo: Err(NetError::NotConnected),
            webhook: Err(NetError::NotConnected),
            requests: Vec::new(),
        }
    }

    pub fn posts(&self) -> Vec<&RecordedRequest> {
        self.requests
            .iter()
            .filter(|r| r.method == Method::Post)
            .collect()
    }
}

impl HttpClientPort for MockHttp {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, NetError> {
        self.requests.push(RecordedRequest {
            method: request.method,
            url: request.url.to_owned(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: request.body.to_vec(),
        });
        match request.method {
            Method::Get => self.geo.clone(),
            Method::Post => self.webhook.clone(),
        }
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Virtual time: `sleep_ms` advances instantly.  The wall clock moves
/// with uptime from the value set by `set_unix`.
pub struct MockClock {
    now_ms: Cell<u64>,
    unix_base: Cell<i64>,
    pub sntp_works: bool,
    sntp_started: bool,
    pub sntp_server: Option<String>,
}

impl MockClock {
    pub fn new(unix: i64) -> Self {
        Self {
            now_ms: Cell::new(0),
            unix_base: Cell::new(unix),
            sntp_works: true,
            sntp_started: false,
            sntp_server: None,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    /// Set the wall clock to `unix` at the current uptime.
    pub fn set_unix(&self, unix: i64) {
        self.unix_base
            .set(unix - (self.now_ms.get() / 1000) as i64);
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn sleep_ms(&self, ms: u32) {
        self.advance_ms(u64::from(ms));
    }

    fn unix_time(&self) -> i64 {
        self.unix_base.get() + (self.now_ms.get() / 1000) as i64
    }

    fn start_sntp(&mut self, server: &str) -> Result<(), NetError> {
        self.sntp_server = Some(server.to_owned());
        self.sntp_started = true;
        Ok(())
    }

    fn sntp_synced(&self) -> bool {
        self.sntp_started && self.sntp_works
    }
}

// ── MockSigner ────────────────────────────────────────────────

pub struct MockSigner {
    inner: HmacSigner,
    pub signed: Vec<Vec<u8>>,
}

impl MockSigner {
    pub fn keyed(key: [u8; 32]) -> Self {
        Self {
            inner: HmacSigner::software(key),
            signed: Vec::new(),
        }
    }

    pub fn unkeyed() -> Self {
        Self {
            inner: HmacSigner::unkeyed(),
            signed: Vec::new(),
        }
    }
}

impl SignerPort for MockSigner {
    fn sign(&mut self, message: &[u8]) -> Result<[u8; 32], SignError> {
        self.signed.push(message.to_vec());
        self.inner.sign(message)
    }
}

// ── MockBoard ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBoard {
    pub leds: u8,
    pub led_history: Vec<u8>,
    pub button: bool,
    pub reset_button: bool,
    pub restarts: u32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardPort for MockBoard {
    fn set_leds(&mut self, mask: u8) {
        self.leds = mask;
        self.led_history.push(mask);
    }

    fn button_pressed(&mut self) -> bool {
        self.button
    }

    fn reset_button_pressed(&mut self) -> bool {
        self.reset_button
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
