//! Device configuration parameters
//!
//! All tunable parameters for the Streak Tracker.  Defaults match the
//! shipping hardware; tests override individual fields (ports, timeouts)
//! with struct-update syntax.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Core device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Captive portal ---
    /// SSID advertised by the onboarding access point (open network)
    pub ap_ssid: String,
    /// Address of the soft-AP interface; every DNS answer points here
    pub ap_ip: Ipv4Addr,
    /// 2.4 GHz channel for the soft-AP
    pub ap_channel: u8,
    /// Maximum simultaneous AP clients
    pub ap_max_clients: u8,
    /// UDP port of the DNS responder
    pub dns_port: u16,
    /// TCP port of the portal HTTP server
    pub http_port: u16,
    /// Stack size of the portal task thread (bytes)
    pub portal_stack_size: usize,

    // --- WiFi station ---
    /// Upper bound for one connection attempt (milliseconds)
    pub connect_timeout_ms: u32,
    /// Consecutive disconnects tolerated before a connect is declared failed
    pub max_connect_retries: u8,

    // --- Time ---
    /// SNTP server host name
    pub ntp_server: String,
    /// Number of one-second polls while waiting for the first sync
    pub ntp_sync_attempts: u8,
    /// IP-geolocation endpoint returning `{"offset": <seconds>}`
    pub geo_url: String,
    /// Timeout for the geolocation request (milliseconds)
    pub geo_timeout_ms: u32,

    // --- Webhook ---
    /// Endpoint receiving button state changes
    pub webhook_url: String,
    /// Timeout for the webhook POST (milliseconds)
    pub webhook_timeout_ms: u32,

    // --- Buttons / LEDs ---
    /// Streak button debounce window (milliseconds)
    pub debounce_ms: u32,
    /// Factory-reset hold duration (milliseconds)
    pub reset_hold_ms: u32,
    /// Onboarding sweep step (milliseconds)
    pub animation_step_ms: u32,

    // --- Timing ---
    /// Steady-loop period (milliseconds)
    pub loop_period_ms: u32,
    /// Local time log period (milliseconds)
    pub time_log_interval_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // Captive portal
            ap_ssid: "StreakTracker".into(),
            ap_ip: Ipv4Addr::new(192, 168, 4, 1),
            ap_channel: 1,
            ap_max_clients: 4,
            dns_port: 53,
            http_port: 80,
            portal_stack_size: 8 * 1024,

            // WiFi station
            connect_timeout_ms: 15_000,
            max_connect_retries: 5,

            // Time
            ntp_server: "pool.ntp.org".into(),
            ntp_sync_attempts: 30,
            geo_url: "http://ip-api.com/json/?fields=offset".into(),
            geo_timeout_ms: 10_000,

            // Webhook
            webhook_url: "https://us-central1-pressit-today.cloudfunctions.net/buttonPress".into(),
            webhook_timeout_ms: 10_000,

            // Buttons / LEDs
            debounce_ms: 50,
            reset_hold_ms: 5_000,
            animation_step_ms: 100,

            // Timing
            loop_period_ms: 10,        // 100 Hz
            time_log_interval_ms: 10_000,
        }
    }
}

impl DeviceConfig {
    /// Reject values the firmware cannot operate with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.ap_ssid.is_empty() || self.ap_ssid.len() > 32 {
            return Err("ap_ssid must be 1–32 bytes");
        }
        if !(1..=13).contains(&self.ap_channel) {
            return Err("ap_channel must be 1–13");
        }
        if !(1..=10).contains(&self.ap_max_clients) {
            return Err("ap_max_clients must be 1–10");
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be > 0");
        }
        if self.ntp_sync_attempts == 0 {
            return Err("ntp_sync_attempts must be > 0");
        }
        if self.loop_period_ms == 0 || self.loop_period_ms >= self.debounce_ms {
            return Err("loop_period_ms must be > 0 and shorter than debounce_ms");
        }
        if self.reset_hold_ms < 1_000 {
            return Err("reset_hold_ms must be >= 1000");
        }
        if self.animation_step_ms == 0 {
            return Err("animation_step_ms must be > 0");
        }
        Ok(())
    }
}
