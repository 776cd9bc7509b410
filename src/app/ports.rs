//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StreakDevice / ProvisioningController (domain)
//! ```
//!
//! Driven adapters (NVS, WiFi, HTTP client, clock, signer, GPIO board)
//! implement these traits.  The domain consumes them via generics, so the
//! streak, provisioning and webhook logic never touches ESP-IDF directly
//! and runs unchanged against the mocks in `tests/integration/`.
//!
//! ## Notes
//!
//! - **StoragePort** writes MUST be atomic per call: every entry in one
//!   [`StoragePort::write_entries`] call lands in one commit or none do.
//! - **WifiPort** reports link changes asynchronously through the
//!   [`NetEvent`](crate::provisioning::link::NetEvent) queue it was built
//!   with, never through return values.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::fmt;
use std::time::Duration;

use crate::provisioning::{AccessPointConfig, ScanEntry, WifiCredentials};

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// One typed NVS entry.
///
/// NVS matches entries by key *and* type: a value written as `U8` is only
/// visible to [`StoragePort::read_u8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue<'a> {
    U8(u8),
    I32(i32),
    Str(&'a str),
}

/// Persistent key-value storage, namespaced like ESP-IDF NVS.
pub trait StoragePort {
    fn read_u8(&self, namespace: &str, key: &str) -> Result<u8, StorageError>;

    fn read_i32(&self, namespace: &str, key: &str) -> Result<i32, StorageError>;

    fn read_str(&self, namespace: &str, key: &str) -> Result<String, StorageError>;

    /// Write several keys of one namespace with a single commit.
    fn write_entries(
        &mut self,
        namespace: &str,
        entries: &[(&str, StoredValue<'_>)],
    ) -> Result<(), StorageError>;

    /// Erase every key of a namespace (factory reset).
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// WiFi port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Station / soft-AP control.  Connection progress arrives as `NetEvent`s.
pub trait WifiPort {
    /// Configure station mode with `creds` and start the radio.
    fn start_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError>;

    /// Switch to AP+STA mode and start the onboarding access point.
    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetError>;

    /// Replace the station configuration without restarting the radio.
    fn configure_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError>;

    /// Begin (or retry) association with the configured network.
    fn connect(&mut self) -> Result<(), NetError>;

    fn disconnect(&mut self) -> Result<(), NetError>;

    /// Active scan of nearby networks.
    fn scan(&mut self) -> Result<Vec<ScanEntry>, NetError>;

    /// Drop the access point and keep only the station interface.
    fn set_station_only(&mut self) -> Result<(), NetError>;
}

// ───────────────────────────────────────────────────────────────
// HTTP client port (driven adapter: domain → internet)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound request.  Borrowed so callers build it on the stack.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait HttpClientPort {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, NetError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: domain ↔ timers / SNTP)
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Milliseconds since boot (monotonic).
    fn now_ms(&self) -> u64;

    /// Block the calling task.
    fn sleep_ms(&self, ms: u32);

    /// Wall clock, UTC seconds since the Unix epoch.  Meaningless until
    /// SNTP has synced.
    fn unix_time(&self) -> i64;

    /// Start periodic SNTP polling against `server`.
    fn start_sntp(&mut self, server: &str) -> Result<(), NetError>;

    /// `true` once the first SNTP exchange has set the wall clock.
    fn sntp_synced(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Signer port (driven adapter: domain → eFuse HMAC peripheral)
// ───────────────────────────────────────────────────────────────

/// Keyed hash over webhook payloads.  The key never leaves the adapter.
pub trait SignerPort {
    /// HMAC-SHA256 of `message`.
    fn sign(&mut self, message: &[u8]) -> Result<[u8; 32], SignError>;
}

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: domain ↔ GPIO)
// ───────────────────────────────────────────────────────────────

pub trait BoardPort {
    /// Drive the 7 LEDs; bit i of `mask` lights LED i.
    fn set_leds(&mut self, mask: u8);

    /// Raw (undebounced) level of the streak button, `true` = pressed.
    fn button_pressed(&mut self) -> bool;

    /// Raw level of the factory-reset button, `true` = pressed.
    fn reset_button_pressed(&mut self) -> bool;

    /// Reboot the chip.  Returns only on the host simulation.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error (ESP-IDF error code where available).
    Io(i32),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Io(code) => write!(f, "I/O error ({code})"),
        }
    }
}

/// Errors from [`WifiPort`], [`HttpClientPort`] and [`ClockPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// No station link.
    NotConnected,
    /// The operation did not finish within its bound.
    Timeout,
    /// Configuration rejected by the driver.
    InvalidConfig,
    /// Underlying driver / socket error (ESP-IDF error code where available).
    Driver(i32),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Timeout => write!(f, "timed out"),
            Self::InvalidConfig => write!(f, "invalid configuration"),
            Self::Driver(code) => write!(f, "driver error ({code})"),
        }
    }
}

/// Errors from [`SignerPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignError {
    /// No key burned into the eFuse block.
    KeyUnavailable,
    /// The HMAC peripheral reported an error.
    Hardware(i32),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyUnavailable => write!(f, "HMAC key unavailable"),
            Self::Hardware(code) => write!(f, "HMAC peripheral error ({code})"),
        }
    }
}
