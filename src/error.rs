//! Unified error types for the Streak Tracker firmware.
//!
//! Port-level errors ([`StorageError`], [`NetError`], [`SignError`]) live
//! next to the port traits in [`crate::app::ports`].  This module holds the
//! domain errors and the top-level [`Error`] every subsystem converts into,
//! so the boot sequence in `main` can propagate with `?`.
//!
//! | Class              | Type                  | Handling                         |
//! |--------------------|-----------------------|----------------------------------|
//! | Transient network  | [`NetError`]          | logged, previous value retained  |
//! | Configuration      | [`CredentialsError`]  | structured reply, nothing stored |
//! | Resource           | [`ProvisioningError`] | fatal, escalated to `main`       |
//! | Persistent store   | [`StorageError`]      | in-memory default, boot goes on  |

use core::fmt;

pub use crate::app::ports::{NetError, SignError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Persistent key-value store failure.
    Storage(StorageError),
    /// WiFi / HTTP / SNTP failure.
    Net(NetError),
    /// Captive portal bring-up failed (unrecoverable).
    Provisioning(ProvisioningError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Net(e) => write!(f, "network: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

// ---------------------------------------------------------------------------
// Credential validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsError {
    /// SSID is empty.
    MissingSsid,
    /// SSID longer than 32 bytes.
    SsidTooLong,
    /// Password longer than 64 bytes.
    PasswordTooLong,
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSsid => write!(f, "No SSID provided"),
            Self::SsidTooLong => write!(f, "SSID too long"),
            Self::PasswordTooLong => write!(f, "Password too long"),
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioning bring-up
// ---------------------------------------------------------------------------

/// Failures that make onboarding impossible.  These are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    /// The soft-AP could not be configured or started.
    AccessPoint(NetError),
    /// The DNS responder socket could not be bound.
    DnsBind(std::io::ErrorKind),
    /// The HTTP listener could not be bound.
    HttpBind(std::io::ErrorKind),
    /// The portal task thread could not be spawned.
    TaskSpawn,
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessPoint(e) => write!(f, "access point start failed ({e})"),
            Self::DnsBind(k) => write!(f, "DNS socket bind failed ({k})"),
            Self::HttpBind(k) => write!(f, "HTTP listener bind failed ({k})"),
            Self::TaskSpawn => write!(f, "portal task spawn failed"),
        }
    }
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}
