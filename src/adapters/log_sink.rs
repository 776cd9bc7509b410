//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  Each line starts
//! with a fixed tag so the serial console can be grepped per subsystem.

use log::{error, info, warn};

use crate::app::events::{AppEvent, StreakCause};
use crate::app::ports::EventSink;
use crate::app::webhook::DeliveryOutcome;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted {
                mac,
                claim_code,
                signing,
            } => {
                info!("BOOT | Device MAC: {}", mac);
                info!("BOOT | Claim Code: {}", claim_code);
                info!(
                    "BOOT | HMAC Signing: {}",
                    if *signing { "ENABLED" } else { "DISABLED" }
                );
            }
            AppEvent::WifiConnected { provisioned } => {
                if *provisioned {
                    info!("WIFI | connected with new credentials");
                } else {
                    info!("WIFI | connected with stored credentials");
                }
            }
            AppEvent::ProvisioningStarted => {
                info!("WIFI | no usable credentials, captive portal starting");
            }
            AppEvent::StreakChanged { mapping, cause } => match cause {
                StreakCause::Loaded => info!("STREAK | loaded 0b{:07b}", mapping),
                StreakCause::Toggled => info!("STREAK | toggled today -> 0b{:07b}", mapping),
                StreakCause::Rolled { shifts } => {
                    info!("STREAK | rolled {} day(s) -> 0b{:07b}", shifts, mapping);
                }
            },
            AppEvent::TimeSynced {
                offset_secs,
                day_of_year,
            } => {
                info!(
                    "TIME | synced, UTC offset {}s, day of year {}",
                    offset_secs, day_of_year
                );
            }
            AppEvent::TimeSyncFailed => {
                warn!("TIME | SNTP sync failed, day rollover disabled until it completes");
            }
            AppEvent::LocalTime { text } => info!("TIME | {}", text),
            AppEvent::Webhook(outcome) => match outcome {
                DeliveryOutcome::Skipped => warn!("WEBHOOK | skipped, WiFi not connected"),
                DeliveryOutcome::Delivered { status, signed } => info!(
                    "WEBHOOK | delivered, HTTP {} ({})",
                    status,
                    if *signed { "signed" } else { "unsigned" }
                ),
                DeliveryOutcome::Failed(e) => error!("WEBHOOK | failed: {}", e),
            },
            AppEvent::ResetCountdown { seconds_left } => {
                warn!("RESET | factory reset in {}s", seconds_left);
            }
            AppEvent::ResetCancelled => info!("RESET | cancelled"),
            AppEvent::FactoryReset => warn!("RESET | storage erased, restarting"),
        }
    }
}
