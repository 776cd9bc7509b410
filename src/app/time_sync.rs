//! Wall-clock synchronisation and local calendar helpers.
//!
//! The device has no RTC battery and no timezone database.  Local time is
//! UTC (from SNTP) plus a fixed offset looked up once per boot from an
//! IP-geolocation service.  Day rollover detection stays disabled until
//! the first SNTP exchange has set the clock.
//!
//! ```text
//!   fetch_timezone_offset()  ──▶  offset_secs (0 on any failure)
//!   synchronize()            ──▶  SNTP poll, 1 s × N attempts
//!   current_day()            ──▶  Some(LocalDay) once synced
//! ```

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::{info, warn};
use serde::Deserialize;

use super::ports::{ClockPort, HttpClientPort, HttpRequest, Method};
use super::streak::LocalDay;
use crate::config::DeviceConfig;

/// 2020-01-01T00:00:00Z.  Anything earlier means the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

const SNTP_POLL_MS: u32 = 1_000;

#[derive(Debug, Deserialize)]
struct GeoOffset {
    offset: i32,
}

/// Extract the `offset` field (seconds east of UTC) from the geolocation body.
pub fn parse_offset(body: &[u8]) -> Option<i32> {
    serde_json::from_slice::<GeoOffset>(body)
        .ok()
        .map(|g| g.offset)
}

/// Local calendar time for `unix` (UTC seconds) shifted by `offset_secs`.
/// `None` if the clock has not been set.
pub fn local_datetime(unix: i64, offset_secs: i32) -> Option<NaiveDateTime> {
    if unix < EPOCH_2020 {
        return None;
    }
    DateTime::from_timestamp(unix + i64::from(offset_secs), 0).map(|dt| dt.naive_utc())
}

/// Day-of-year of `dt`, with the length of the year before it.
pub fn local_day(dt: &NaiveDateTime) -> LocalDay {
    let prior_year_days = NaiveDate::from_ymd_opt(dt.year() - 1, 12, 31)
        .map_or(365, |d| d.ordinal() as u16);
    LocalDay::new(dt.ordinal0() as u16, prior_year_days)
}

/// `YYYY-MM-DD`, or `"unknown"` when the clock has not been set.
pub fn iso_date(unix: i64, offset_secs: i32) -> String {
    match local_datetime(unix, offset_secs) {
        Some(dt) => format!("{:04}-{:02}-{:02}", dt.year(), dt.month(), dt.day()),
        None => "unknown".into(),
    }
}

/// `YYYY-MM-DD HH:MM:SS (UTC+h.h)` for the periodic time log.
pub fn format_local_time(unix: i64, offset_secs: i32) -> Option<String> {
    let dt = local_datetime(unix, offset_secs)?;
    Some(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} (UTC{:+.1})",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        f64::from(offset_secs) / 3600.0
    ))
}

// ───────────────────────────────────────────────────────────────
// TimeSyncService
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TimeSyncService {
    offset_secs: i32,
    synced: bool,
}

impl TimeSyncService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_secs(&self) -> i32 {
        self.offset_secs
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Look up the UTC offset for our public IP.  Never fails: any problem
    /// leaves the offset at zero.
    pub fn fetch_timezone_offset(
        &mut self,
        http: &mut impl HttpClientPort,
        config: &DeviceConfig,
    ) -> i32 {
        info!("Time: detecting timezone from IP...");
        let request = HttpRequest {
            method: Method::Get,
            url: &config.geo_url,
            headers: &[],
            body: &[],
            timeout: Duration::from_millis(u64::from(config.geo_timeout_ms)),
        };

        self.offset_secs = match http.execute(&request) {
            Ok(resp) if resp.status == 200 => match parse_offset(&resp.body) {
                Some(offset) => {
                    info!(
                        "Time: detected offset {} s (UTC{:+.1})",
                        offset,
                        f64::from(offset) / 3600.0
                    );
                    offset
                }
                None => {
                    warn!("Time: geolocation body has no offset, using UTC");
                    0
                }
            },
            Ok(resp) => {
                warn!("Time: geolocation returned HTTP {}, using UTC", resp.status);
                0
            }
            Err(e) => {
                warn!("Time: timezone detection failed ({}), using UTC", e);
                0
            }
        };
        self.offset_secs
    }

    /// Detect the timezone, start SNTP and wait for the first sync.
    ///
    /// Returns `true` once the wall clock is valid.  On `false` SNTP keeps
    /// polling in the background and [`poll_late_sync`](Self::poll_late_sync)
    /// picks it up later.
    pub fn synchronize(
        &mut self,
        clock: &mut impl ClockPort,
        http: &mut impl HttpClientPort,
        config: &DeviceConfig,
    ) -> bool {
        self.fetch_timezone_offset(http, config);

        info!("Time: syncing with NTP server {}", config.ntp_server);
        if let Err(e) = clock.start_sntp(&config.ntp_server) {
            warn!("Time: SNTP start failed ({})", e);
            return false;
        }

        // Each status read may consume a completion; keep what we saw.
        let mut synced = clock.sntp_synced();
        let mut attempt = 0;
        while !synced && attempt < config.ntp_sync_attempts {
            attempt += 1;
            info!(
                "Time: waiting for NTP sync... (attempt {}/{})",
                attempt, config.ntp_sync_attempts
            );
            clock.sleep_ms(SNTP_POLL_MS);
            synced = clock.sntp_synced();
        }

        self.synced = synced;
        if self.synced {
            if let Some(now) = format_local_time(clock.unix_time(), self.offset_secs) {
                info!("Time: synced, local time {}", now);
            }
        } else {
            warn!("Time: NTP sync failed, day rollover disabled until a later sync");
        }
        self.synced
    }

    /// Background SNTP completed after `synchronize` gave up.
    /// Returns `true` exactly once, on the transition.
    pub fn poll_late_sync(&mut self, clock: &impl ClockPort) -> bool {
        if self.synced || !clock.sntp_synced() {
            return false;
        }
        self.synced = true;
        info!("Time: late NTP sync completed");
        true
    }

    /// Current local day.  `None` until synced.
    pub fn current_day(&self, clock: &impl ClockPort) -> Option<LocalDay> {
        if !self.synced {
            return None;
        }
        local_datetime(clock.unix_time(), self.offset_secs).map(|dt| local_day(&dt))
    }

    /// Local date for the webhook payload.
    pub fn local_date(&self, clock: &impl ClockPort) -> String {
        iso_date(clock.unix_time(), self.offset_secs)
    }
}
