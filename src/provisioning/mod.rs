//! WiFi onboarding.
//!
//! ```text
//!   attempt_stored_connection ──ok──▶ done
//!            │ no creds / failed
//!            ▼
//!   run_provisioning
//!     start_session   AP+STA up, DNS + HTTP tasks on the portal thread
//!     drive_session   control path: LED sweep, link pump, PortalCommands
//!     finish_session  stop tasks (no drain), station-only
//! ```
//!
//! The controller owns every port for the whole flow.  The portal thread
//! only parses requests and forwards them through the
//! [`PortalBridge`](bridge::PortalBridge).

pub mod bridge;
pub mod dns;
pub mod http;
pub mod link;
pub mod portal;

use std::net::{Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use async_io_mini::Async;
use edge_executor::LocalExecutor;
use log::{error, info, warn};

use crate::app::ports::{BoardPort, ClockPort, StorageError, StoragePort, StoredValue, WifiPort};
use crate::app::streak::STREAK_NAMESPACE;
use crate::config::DeviceConfig;
use crate::drivers::led_patterns::SweepAnimation;
use crate::error::{CredentialsError, ProvisioningError};

use bridge::{PortalBridge, PortalCommand, PortalReply};
use link::{LinkMonitor, LinkStatus};
use portal::ConnectOutcome;

pub const WIFI_NAMESPACE: &str = "wifi";
const KEY_SSID: &str = "ssid";
const KEY_PASSWORD: &str = "password";

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;

/// Pause between dropping the old association and reconfiguring.
const RECONFIGURE_PAUSE_MS: u32 = 100;
/// Delay between the reset answer and the reboot.
const RESET_RESTART_DELAY_MS: u64 = 1000;
/// Upper bound on waiting for the connect answer to reach the client.
const REPLY_FLUSH_GRACE_MS: u64 = 1000;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<MAX_SSID_LEN>,
    password: heapless::String<MAX_PASSWORD_LEN>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialsError> {
        if ssid.is_empty() {
            return Err(CredentialsError::MissingSsid);
        }
        let ssid = heapless::String::try_from(ssid).map_err(|()| CredentialsError::SsidTooLong)?;
        let password =
            heapless::String::try_from(password).map_err(|()| CredentialsError::PasswordTooLong)?;
        Ok(Self { ssid, password })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// No password means an open network.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Stored credentials, or `None` when the device is not provisioned.
    pub fn load(storage: &impl StoragePort) -> Option<Self> {
        let ssid = match storage.read_str(WIFI_NAMESPACE, KEY_SSID) {
            Ok(ssid) => ssid,
            Err(StorageError::NotFound) => return None,
            Err(e) => {
                warn!("Credentials: read failed ({})", e);
                return None;
            }
        };

        let password = match storage.read_str(WIFI_NAMESPACE, KEY_PASSWORD) {
            Ok(password) => password,
            Err(StorageError::NotFound) => String::new(),
            Err(e) => {
                warn!("Credentials: password read failed ({})", e);
                return None;
            }
        };

        Self::new(&ssid, &password).ok()
    }

    pub fn save(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.write_entries(
            WIFI_NAMESPACE,
            &[
                (KEY_SSID, StoredValue::Str(&self.ssid)),
                (KEY_PASSWORD, StoredValue::Str(&self.password)),
            ],
        )
    }

    pub fn clear(storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.erase_namespace(WIFI_NAMESPACE)
    }
}

// ───────────────────────────────────────────────────────────────
// Radio-facing types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub ssid: String,
    pub channel: u8,
    pub max_clients: u8,
    pub ip: Ipv4Addr,
}

impl AccessPointConfig {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            ssid: config.ap_ssid.clone(),
            channel: config.ap_channel,
            max_clients: config.ap_max_clients,
            ip: config.ap_ip,
        }
    }
}

/// Authentication mode reported by a scan, numbered like `wifi_auth_mode_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPersonal,
    Wpa2Personal,
    WpaWpa2Personal,
    Wpa2Enterprise,
    Wpa3Personal,
    Wpa2Wpa3Personal,
    Other(u8),
}

impl AuthMode {
    pub fn code(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Wep => 1,
            Self::WpaPersonal => 2,
            Self::Wpa2Personal => 3,
            Self::WpaWpa2Personal => 4,
            Self::Wpa2Enterprise => 5,
            Self::Wpa3Personal => 6,
            Self::Wpa2Wpa3Personal => 7,
            Self::Other(c) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i8,
    pub auth: AuthMode,
}

impl ScanEntry {
    pub fn new(ssid: &str, rssi: i8, auth: AuthMode) -> Self {
        Self {
            ssid: ssid.to_owned(),
            rssi,
            auth,
        }
    }
}

/// Signal bars for the portal: ≥-50 → 4, ≥-60 → 3, ≥-70 → 2, else 1.
pub fn rssi_bucket(rssi: i8) -> u8 {
    if rssi >= -50 {
        4
    } else if rssi >= -60 {
        3
    } else if rssi >= -70 {
        2
    } else {
        1
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Ports the onboarding flow drives.  Borrowed from the device for the
/// duration of one call.
pub struct OnboardingPorts<'a, W, S, C, B> {
    pub wifi: &'a mut W,
    pub storage: &'a mut S,
    pub clock: &'a C,
    pub board: &'a mut B,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// A client connected the station; credentials are stored.
    Provisioned(WifiCredentials),
    /// A client asked for a factory reset; storage is wiped and the
    /// caller must restart.
    FactoryReset,
}

/// Live portal: the AP is up and the DNS/HTTP tasks run on their thread.
pub struct ProvisioningSession {
    bridge: Arc<PortalBridge>,
    thread: Option<JoinHandle<()>>,
    dns_addr: SocketAddr,
    http_addr: SocketAddr,
}

impl ProvisioningSession {
    pub fn dns_addr(&self) -> SocketAddr {
        self.dns_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }
}

enum Phase {
    Idle,
    Connecting {
        creds: WifiCredentials,
        deadline: u64,
    },
    Completing {
        creds: WifiCredentials,
        deadline: u64,
    },
    Restarting {
        at: u64,
    },
}

pub struct ProvisioningController {
    ap: AccessPointConfig,
    dns_port: u16,
    http_port: u16,
    stack_size: usize,
    connect_timeout_ms: u64,
    loop_period_ms: u32,
    claim_code: String,
    animation: SweepAnimation,
}

impl ProvisioningController {
    pub fn new(config: &DeviceConfig, claim_code: &str) -> Self {
        Self {
            ap: AccessPointConfig::from_config(config),
            dns_port: config.dns_port,
            http_port: config.http_port,
            stack_size: config.portal_stack_size,
            connect_timeout_ms: u64::from(config.connect_timeout_ms),
            loop_period_ms: config.loop_period_ms,
            claim_code: claim_code.to_owned(),
            animation: SweepAnimation::new(config.animation_step_ms),
        }
    }

    /// Connect with stored credentials, bounded by the connect timeout.
    pub fn attempt_stored_connection<W, S, C, B>(
        &mut self,
        link: &mut LinkMonitor,
        ports: &mut OnboardingPorts<'_, W, S, C, B>,
    ) -> bool
    where
        W: WifiPort,
        S: StoragePort,
        C: ClockPort,
        B: BoardPort,
    {
        let Some(creds) = WifiCredentials::load(&*ports.storage) else {
            info!("Provisioning: no stored credentials");
            return false;
        };

        info!("Provisioning: connecting to stored network '{}'", creds.ssid());
        link.clear();
        if let Err(e) = ports.wifi.start_station(&creds) {
            warn!("Provisioning: station start failed ({})", e);
            return false;
        }

        let deadline = ports.clock.now_ms() + self.connect_timeout_ms;
        loop {
            self.animate(ports.clock, ports.board);
            match link.pump(ports.wifi) {
                LinkStatus::Connected => {
                    info!("Provisioning: connected with stored credentials");
                    return true;
                }
                LinkStatus::Failed => {
                    warn!("Provisioning: stored network unreachable");
                    return false;
                }
                LinkStatus::Pending => {}
            }
            if ports.clock.now_ms() >= deadline {
                warn!("Provisioning: stored connection timed out");
                return false;
            }
            ports.clock.sleep_ms(self.loop_period_ms);
        }
    }

    /// Full onboarding: returns once a client connected the station or
    /// asked for a factory reset.  Bring-up failures are fatal.
    pub fn run_provisioning<W, S, C, B>(
        &mut self,
        link: &mut LinkMonitor,
        ports: &mut OnboardingPorts<'_, W, S, C, B>,
    ) -> Result<ProvisioningOutcome, ProvisioningError>
    where
        W: WifiPort,
        S: StoragePort,
        C: ClockPort,
        B: BoardPort,
    {
        let session = self.start_session(ports.wifi)?;
        let outcome = self.drive_session(&session, link, ports);
        self.finish_session(session, ports.wifi, ports.board);
        Ok(outcome)
    }

    /// Bring up the AP and the portal thread.
    pub fn start_session(
        &mut self,
        wifi: &mut impl WifiPort,
    ) -> Result<ProvisioningSession, ProvisioningError> {
        info!(
            "Provisioning: starting AP '{}' on {} (ch {})",
            self.ap.ssid, self.ap.ip, self.ap.channel
        );
        wifi.start_access_point(&self.ap)
            .map_err(ProvisioningError::AccessPoint)?;

        let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.dns_port))
            .map_err(|e| ProvisioningError::DnsBind(e.kind()))?;
        let tcp = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.http_port))
            .map_err(|e| ProvisioningError::HttpBind(e.kind()))?;
        let dns_addr = udp
            .local_addr()
            .map_err(|e| ProvisioningError::DnsBind(e.kind()))?;
        let http_addr = tcp
            .local_addr()
            .map_err(|e| ProvisioningError::HttpBind(e.kind()))?;

        let bridge = Arc::new(PortalBridge::new());
        let (ready_tx, ready_rx) = mpsc::channel();
        let task_bridge = bridge.clone();
        let ap_ip = self.ap.ip;

        let thread = thread::Builder::new()
            .name("portal".into())
            .stack_size(self.stack_size)
            .spawn(move || run_portal(udp, tcp, &task_bridge, ap_ip, &ready_tx))
            .map_err(|_| ProvisioningError::TaskSpawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => return Err(ProvisioningError::TaskSpawn),
        }

        info!(
            "Provisioning: portal up (DNS {}, HTTP {})",
            dns_addr, http_addr
        );
        Ok(ProvisioningSession {
            bridge,
            thread: Some(thread),
            dns_addr,
            http_addr,
        })
    }

    /// Cooperative loop on the control path until the flow completes.
    pub fn drive_session<W, S, C, B>(
        &mut self,
        session: &ProvisioningSession,
        link: &mut LinkMonitor,
        ports: &mut OnboardingPorts<'_, W, S, C, B>,
    ) -> ProvisioningOutcome
    where
        W: WifiPort,
        S: StoragePort,
        C: ClockPort,
        B: BoardPort,
    {
        let bridge = &session.bridge;
        let mut phase = Phase::Idle;

        loop {
            self.animate(ports.clock, ports.board);
            let status = link.pump(ports.wifi);
            let now = ports.clock.now_ms();

            phase = match phase {
                Phase::Idle => match bridge.next_command() {
                    Some(cmd) => self.execute(cmd, bridge, link, ports),
                    None => Phase::Idle,
                },
                Phase::Connecting { creds, deadline } => match status {
                    LinkStatus::Connected => {
                        info!("Provisioning: connected to '{}'", creds.ssid());
                        if let Err(e) = creds.save(ports.storage) {
                            error!("Provisioning: failed to store credentials ({})", e);
                        }
                        bridge.respond(PortalReply::Connect(ConnectOutcome::Connected {
                            claim_code: self.claim_code.clone(),
                        }));
                        Phase::Completing {
                            creds,
                            deadline: now + REPLY_FLUSH_GRACE_MS,
                        }
                    }
                    LinkStatus::Failed => {
                        warn!("Provisioning: connection to '{}' failed", creds.ssid());
                        bridge.respond(PortalReply::Connect(ConnectOutcome::Failed));
                        Phase::Idle
                    }
                    LinkStatus::Pending if now >= deadline => {
                        warn!("Provisioning: connection to '{}' timed out", creds.ssid());
                        bridge.respond(PortalReply::Connect(ConnectOutcome::Failed));
                        Phase::Idle
                    }
                    LinkStatus::Pending => Phase::Connecting { creds, deadline },
                },
                Phase::Completing { creds, deadline } => {
                    if bridge.connect_reply_sent() || now >= deadline {
                        info!("Provisioning: complete");
                        return ProvisioningOutcome::Provisioned(creds);
                    }
                    Phase::Completing { creds, deadline }
                }
                Phase::Restarting { at } => {
                    if now >= at {
                        return ProvisioningOutcome::FactoryReset;
                    }
                    Phase::Restarting { at }
                }
            };

            ports.clock.sleep_ms(self.loop_period_ms);
        }
    }

    fn execute<W, S, C, B>(
        &mut self,
        cmd: PortalCommand,
        bridge: &PortalBridge,
        link: &mut LinkMonitor,
        ports: &mut OnboardingPorts<'_, W, S, C, B>,
    ) -> Phase
    where
        W: WifiPort,
        S: StoragePort,
        C: ClockPort,
        B: BoardPort,
    {
        match cmd {
            PortalCommand::Scan => {
                let networks = ports.wifi.scan().unwrap_or_else(|e| {
                    warn!("Provisioning: scan failed ({})", e);
                    Vec::new()
                });
                bridge.respond(PortalReply::Networks(networks));
                Phase::Idle
            }
            PortalCommand::Connect(creds) => {
                link.clear();
                if let Err(e) = ports.wifi.disconnect() {
                    // Not associated yet is the common case here.
                    info!("Provisioning: disconnect ({})", e);
                }
                ports.clock.sleep_ms(RECONFIGURE_PAUSE_MS);

                let started = ports
                    .wifi
                    .configure_station(&creds)
                    .and_then(|()| ports.wifi.connect());
                if let Err(e) = started {
                    warn!("Provisioning: station reconfigure failed ({})", e);
                    bridge.respond(PortalReply::Connect(ConnectOutcome::Failed));
                    return Phase::Idle;
                }
                Phase::Connecting {
                    creds,
                    deadline: ports.clock.now_ms() + self.connect_timeout_ms,
                }
            }
            PortalCommand::FactoryReset => {
                warn!("Provisioning: erasing credentials and streak");
                for ns in [WIFI_NAMESPACE, STREAK_NAMESPACE] {
                    if let Err(e) = ports.storage.erase_namespace(ns) {
                        error!("Provisioning: erase '{}' failed ({})", ns, e);
                    }
                }
                bridge.respond(PortalReply::ResetDone);
                Phase::Restarting {
                    at: ports.clock.now_ms() + RESET_RESTART_DELAY_MS,
                }
            }
        }
    }

    /// Stop the portal tasks and narrow the radio to station-only.
    pub fn finish_session(
        &mut self,
        mut session: ProvisioningSession,
        wifi: &mut impl WifiPort,
        board: &mut impl BoardPort,
    ) {
        session.bridge.shutdown();
        if let Some(handle) = session.thread.take() {
            if handle.join().is_err() {
                error!("Provisioning: portal thread panicked");
            }
        }
        if let Err(e) = wifi.set_station_only() {
            warn!("Provisioning: station-only switch failed ({})", e);
        }
        self.animation.reset();
        board.set_leds(0);
        info!("Provisioning: portal stopped");
    }

    fn animate(&mut self, clock: &impl ClockPort, board: &mut impl BoardPort) {
        if let Some(mask) = self.animation.tick(clock.now_ms()) {
            board.set_leds(mask);
        }
    }
}

/// Portal thread body: DNS and HTTP tasks on a local executor until the
/// bridge signals shutdown.  Dropping the task handles cancels both.
fn run_portal(
    udp: UdpSocket,
    tcp: TcpListener,
    bridge: &PortalBridge,
    ap_ip: Ipv4Addr,
    ready: &mpsc::Sender<Result<(), ProvisioningError>>,
) {
    let udp = match Async::new(udp) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(ProvisioningError::DnsBind(e.kind())));
            return;
        }
    };
    let tcp = match Async::new(tcp) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(ProvisioningError::HttpBind(e.kind())));
            return;
        }
    };
    let portal_url = format!("http://{}/", ap_ip);

    let executor: LocalExecutor<'_, 4> = LocalExecutor::new();
    let dns_task = executor.spawn(dns::serve(udp, ap_ip));
    let http_task = executor.spawn(http::serve(tcp, bridge, &portal_url));
    let _ = ready.send(Ok(()));

    futures_lite::future::block_on(executor.run(bridge.stopped()));

    drop(http_task);
    drop(dns_task);
}
