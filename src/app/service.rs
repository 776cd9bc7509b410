//! Application service: the hexagonal core.
//!
//! [`StreakDevice`] owns every port plus the streak, link, time and
//! webhook state.  `main` calls [`boot`](StreakDevice::boot) once and
//! then [`run`](StreakDevice::run); tests drive
//! [`tick`](StreakDevice::tick) directly against mock adapters.
//!
//! ```text
//!  StoragePort ─┐                          ┌──▶ EventSink
//!  WifiPort    ─┤   ┌──────────────────┐   │
//!  HttpClient  ─┼──▶│   StreakDevice   │───┘
//!  ClockPort   ─┤   │ streak · link ·  │
//!  SignerPort  ─┤   │ time · webhook   │
//!  BoardPort   ─┘   └──────────────────┘
//! ```

use std::sync::Arc;

use log::{error, info, warn};

use crate::adapters::device_id::{self, MacAddress};
use crate::config::DeviceConfig;
use crate::drivers::button::{ButtonDebouncer, HoldStatus, ResetHold};
use crate::drivers::led_patterns::{ALL_LEDS, FLASH_PERIOD_MS, RESET_FLASHES};
use crate::error::Error;
use crate::provisioning::link::{LinkMonitor, NetEventQueue};
use crate::provisioning::{
    OnboardingPorts, ProvisioningController, ProvisioningOutcome, WIFI_NAMESPACE,
};

use super::events::{AppEvent, StreakCause};
use super::ports::{
    BoardPort, ClockPort, EventSink, HttpClientPort, SignerPort, StoragePort, WifiPort,
};
use super::streak::{STREAK_NAMESPACE, StreakState, StreakStore};
use super::time_sync::{TimeSyncService, format_local_time};
use super::webhook::WebhookDispatcher;

/// Wait between the erase and the reboot of a button factory reset.
const RESET_SETTLE_MS: u32 = 500;

/// Message signed once at boot to find out whether the key exists.
const SIGNING_TEST_MESSAGE: &[u8] = b"test";

/// Every adapter the device drives, moved in once at construction.
pub struct DevicePorts<S, W, H, C, K, B> {
    pub storage: S,
    pub wifi: W,
    pub http: H,
    pub clock: C,
    pub signer: K,
    pub board: B,
}

// ───────────────────────────────────────────────────────────────
// StreakDevice
// ───────────────────────────────────────────────────────────────

pub struct StreakDevice<S, W, H, C, K, B> {
    config: DeviceConfig,
    ports: DevicePorts<S, W, H, C, K, B>,
    mac: String,
    claim_code: String,
    streak: StreakStore,
    link: LinkMonitor,
    time: TimeSyncService,
    webhook: WebhookDispatcher,
    button: ButtonDebouncer,
    reset_hold: ResetHold,
    last_time_log_ms: u64,
    /// Set once a restart was requested; only the host simulation gets
    /// past `restart()`, and it then idles.
    restart_pending: bool,
}

impl<S, W, H, C, K, B> StreakDevice<S, W, H, C, K, B>
where
    S: StoragePort,
    W: WifiPort,
    H: HttpClientPort,
    C: ClockPort,
    K: SignerPort,
    B: BoardPort,
{
    /// Build the device and try the signing key once.
    ///
    /// `events` must be the queue the WiFi adapter publishes into.
    pub fn new(
        config: DeviceConfig,
        mac: &MacAddress,
        mut ports: DevicePorts<S, W, H, C, K, B>,
        events: Arc<NetEventQueue>,
    ) -> Self {
        let mac_text = device_id::mac_string(mac);
        let claim_code = device_id::claim_code(mac);

        let signing = match ports.signer.sign(SIGNING_TEST_MESSAGE) {
            Ok(_) => true,
            Err(e) => {
                warn!("HMAC key check failed ({}), webhooks will be unsigned", e);
                false
            }
        };

        Self {
            link: LinkMonitor::new(events, config.max_connect_retries),
            webhook: WebhookDispatcher::new(
                &config.webhook_url,
                config.webhook_timeout_ms,
                &mac_text,
                signing,
            ),
            button: ButtonDebouncer::new(config.debounce_ms),
            reset_hold: ResetHold::new(config.reset_hold_ms),
            streak: StreakStore::default(),
            time: TimeSyncService::new(),
            mac: mac_text.as_str().to_owned(),
            claim_code: claim_code.as_str().to_owned(),
            last_time_log_ms: 0,
            restart_pending: false,
            config,
            ports,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Banner, streak restore, WiFi (stored or captive portal), time sync.
    ///
    /// Only portal bring-up failures are returned; every network problem
    /// after that degrades and boot continues.
    pub fn boot(&mut self, sink: &mut impl EventSink) -> Result<(), Error> {
        sink.emit(&AppEvent::Booted {
            mac: self.mac.clone(),
            claim_code: self.claim_code.clone(),
            signing: self.webhook.signing_enabled(),
        });

        self.streak = StreakStore::load(&self.ports.storage);
        self.show_streak();
        sink.emit(&AppEvent::StreakChanged {
            mapping: self.streak.state().mapping(),
            cause: StreakCause::Loaded,
        });

        if !self.bring_up_wifi(sink)? {
            return Ok(());
        }
        self.show_streak();

        if self.time.synchronize(
            &mut self.ports.clock,
            &mut self.ports.http,
            &self.config,
        ) {
            self.report_sync(sink);
            self.roll_over(sink);
        } else {
            sink.emit(&AppEvent::TimeSyncFailed);
        }

        self.last_time_log_ms = self.ports.clock.now_ms();
        Ok(())
    }

    /// Steady loop.  Never returns on the device.
    pub fn run(&mut self, sink: &mut impl EventSink) -> ! {
        info!("Device: entering main loop");
        loop {
            self.tick(sink);
            self.ports.clock.sleep_ms(self.config.loop_period_ms);
        }
    }

    /// One iteration of the steady loop.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        if self.restart_pending {
            return;
        }
        let now = self.ports.clock.now_ms();
        self.link.pump(&mut self.ports.wifi);

        if self.poll_reset_button(now, sink) {
            return;
        }

        if !self.reset_hold.is_holding() {
            let pressed = self.ports.board.button_pressed();
            if self.button.update(pressed, now) {
                self.toggle_today(sink);
            }
        }

        if self.time.poll_late_sync(&self.ports.clock) {
            self.report_sync(sink);
        }
        self.roll_over(sink);

        if now.saturating_sub(self.last_time_log_ms) >= u64::from(self.config.time_log_interval_ms)
        {
            self.last_time_log_ms = now;
            if self.time.is_synced() {
                if let Some(text) =
                    format_local_time(self.ports.clock.unix_time(), self.time.offset_secs())
                {
                    sink.emit(&AppEvent::LocalTime { text });
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn streak_state(&self) -> StreakState {
        self.streak.state()
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn claim_code(&self) -> &str {
        &self.claim_code
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn signing_enabled(&self) -> bool {
        self.webhook.signing_enabled()
    }

    pub fn time_synced(&self) -> bool {
        self.time.is_synced()
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    pub fn ports(&self) -> &DevicePorts<S, W, H, C, K, B> {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut DevicePorts<S, W, H, C, K, B> {
        &mut self.ports
    }

    // ── Internal ──────────────────────────────────────────────

    /// Returns `false` when the portal asked for a factory reset and the
    /// board has been restarted.
    fn bring_up_wifi(&mut self, sink: &mut impl EventSink) -> Result<bool, Error> {
        let mut controller = ProvisioningController::new(&self.config, &self.claim_code);
        let mut onboarding = OnboardingPorts {
            wifi: &mut self.ports.wifi,
            storage: &mut self.ports.storage,
            clock: &self.ports.clock,
            board: &mut self.ports.board,
        };

        if controller.attempt_stored_connection(&mut self.link, &mut onboarding) {
            sink.emit(&AppEvent::WifiConnected { provisioned: false });
            return Ok(true);
        }

        sink.emit(&AppEvent::ProvisioningStarted);
        match controller.run_provisioning(&mut self.link, &mut onboarding)? {
            ProvisioningOutcome::Provisioned(creds) => {
                info!("Device: provisioned on '{}'", creds.ssid());
                sink.emit(&AppEvent::WifiConnected { provisioned: true });
                Ok(true)
            }
            ProvisioningOutcome::FactoryReset => {
                self.streak.clear();
                sink.emit(&AppEvent::FactoryReset);
                self.restart_pending = true;
                self.ports.board.restart();
                Ok(false)
            }
        }
    }

    /// Feed the reset button.  Returns `true` when a factory reset ran.
    fn poll_reset_button(&mut self, now: u64, sink: &mut impl EventSink) -> bool {
        let pressed = self.ports.board.reset_button_pressed();
        match self.reset_hold.update(pressed, now) {
            HoldStatus::Idle => false,
            HoldStatus::Started => {
                info!("Reset: button held, keep holding to erase");
                false
            }
            HoldStatus::Progress { leds, countdown } => {
                self.ports.board.set_leds(leds);
                if let Some(seconds_left) = countdown {
                    sink.emit(&AppEvent::ResetCountdown { seconds_left });
                }
                false
            }
            HoldStatus::Cancelled => {
                self.show_streak();
                sink.emit(&AppEvent::ResetCancelled);
                false
            }
            HoldStatus::Triggered => {
                self.factory_reset(sink);
                true
            }
        }
    }

    fn factory_reset(&mut self, sink: &mut impl EventSink) {
        let board = &mut self.ports.board;
        let clock = &self.ports.clock;
        for _ in 0..RESET_FLASHES {
            board.set_leds(ALL_LEDS);
            clock.sleep_ms(FLASH_PERIOD_MS);
            board.set_leds(0);
            clock.sleep_ms(FLASH_PERIOD_MS);
        }

        for ns in [WIFI_NAMESPACE, STREAK_NAMESPACE] {
            if let Err(e) = self.ports.storage.erase_namespace(ns) {
                error!("Reset: erase '{}' failed ({})", ns, e);
            }
        }
        self.streak.clear();
        sink.emit(&AppEvent::FactoryReset);

        self.ports.clock.sleep_ms(RESET_SETTLE_MS);
        self.restart_pending = true;
        self.ports.board.restart();
    }

    fn toggle_today(&mut self, sink: &mut impl EventSink) {
        let today = self.streak.toggle_today(&mut self.ports.storage);
        self.show_streak();
        sink.emit(&AppEvent::StreakChanged {
            mapping: self.streak.state().mapping(),
            cause: StreakCause::Toggled,
        });

        let date = self.time.local_date(&self.ports.clock);
        let outcome = self.webhook.send(
            today,
            self.link.is_connected(),
            &date,
            self.ports.clock.unix_time(),
            &mut self.ports.http,
            &mut self.ports.signer,
        );
        sink.emit(&AppEvent::Webhook(outcome));
    }

    /// Apply missed day changes.  No-op until the clock is synced.
    fn roll_over(&mut self, sink: &mut impl EventSink) {
        let Some(day) = self.time.current_day(&self.ports.clock) else {
            return;
        };
        let shifts = self.streak.reconcile(day, &mut self.ports.storage);
        if shifts > 0 {
            self.show_streak();
            sink.emit(&AppEvent::StreakChanged {
                mapping: self.streak.state().mapping(),
                cause: StreakCause::Rolled { shifts },
            });
        }
    }

    fn report_sync(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::TimeSynced {
            offset_secs: self.time.offset_secs(),
            day_of_year: self.time.current_day(&self.ports.clock).map_or(0, |d| d.ordinal),
        });
    }

    fn show_streak(&mut self) {
        self.ports.board.set_leds(self.streak.state().mapping());
    }
}
