//! Outbound application events.
//!
//! The [`StreakDevice`](super::service::StreakDevice) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  The log adapter turns
//! them into serial output; tests record them.

use super::webhook::DeliveryOutcome;

/// What changed the streak mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakCause {
    /// Restored from persistent storage at boot.
    Loaded,
    /// The streak button flipped today's bit.
    Toggled,
    /// One or more day rollovers shifted the mapping.
    Rolled { shifts: u8 },
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot banner: identity and signing capability.
    Booted {
        mac: String,
        claim_code: String,
        signing: bool,
    },

    /// The station interface came up (stored or freshly provisioned credentials).
    WifiConnected { provisioned: bool },

    /// No usable stored credentials; the captive portal is starting.
    ProvisioningStarted,

    /// The 7-bit mapping changed.
    StreakChanged { mapping: u8, cause: StreakCause },

    /// Wall clock synchronised.
    TimeSynced { offset_secs: i32, day_of_year: u16 },

    /// First SNTP sync did not complete; rollover detection stays off.
    TimeSyncFailed,

    /// Periodic local time report.
    LocalTime { text: String },

    /// Webhook attempt finished (or was skipped).
    Webhook(DeliveryOutcome),

    /// Factory-reset button is being held.
    ResetCountdown { seconds_left: u8 },

    /// Factory-reset button released early.
    ResetCancelled,

    /// Storage wiped; restart follows.
    FactoryReset,
}
