//! System clock adapter.
//!
//! Implements [`ClockPort`]: monotonic uptime, blocking delays, wall clock
//! and SNTP.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime,
//!   FreeRTOS delays, `EspSntp` in poll mode for the wall clock.  The
//!   sync callback latches completion in an `AtomicBool`, because
//!   `sntp_get_sync_status()` reports `Completed` only once.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and the host
//!   wall clock, which is treated as already synchronised once SNTP is
//!   "started".

use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::app::ports::{ClockPort, NetError};

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    hal::delay::FreeRtos,
    sntp::{EspSntp, OperatingMode, SntpConf, SyncMode},
};

pub struct SystemClock {
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
    /// Set from the SNTP task on every completed sync.
    #[cfg(target_os = "espidf")]
    synced: Arc<AtomicBool>,

    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    sntp_started: bool,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(target_os = "espidf")]
            synced: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sntp_started: false,
        }
    }
}

impl ClockPort for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(&self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    fn unix_time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }

    #[cfg(target_os = "espidf")]
    fn start_sntp(&mut self, server: &str) -> Result<(), NetError> {
        if self.sntp.is_some() {
            return Ok(());
        }
        let mut conf = SntpConf {
            sync_mode: SyncMode::Immediate,
            operating_mode: OperatingMode::Poll,
            ..Default::default()
        };
        conf.servers[0] = server;

        info!("Clock: starting SNTP against {}", server);
        let synced = Arc::clone(&self.synced);
        let sntp = EspSntp::new_with_callback(&conf, move |_| {
            synced.store(true, Ordering::Release);
        })
        .map_err(|e| NetError::Driver(e.code()))?;
        self.sntp = Some(sntp);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_sntp(&mut self, server: &str) -> Result<(), NetError> {
        info!("Clock(sim): SNTP against {} (host clock)", server);
        self.sntp_started = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn sntp_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sntp_synced(&self) -> bool {
        self.sntp_started
    }
}
