//! WiFi adapter (station + onboarding soft-AP).
//!
//! Implements [`WifiPort`].  Link progress is never returned from calls;
//! the driver's event callbacks push [`NetEvent`]s into the shared queue
//! and the [`LinkMonitor`](crate::provisioning::link::LinkMonitor) on the
//! control path consumes them.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` with system event loop
//!   subscriptions for `WifiEvent` / `IpEvent`.
//! - **all other targets**: a simulated radio that accepts any network
//!   and reports a fixed scan list.

use std::sync::Arc;

use log::info;

use crate::app::ports::{NetError, WifiPort};
use crate::provisioning::link::{NetEvent, NetEventQueue, publish};
use crate::provisioning::{AccessPointConfig, AuthMode, ScanEntry, WifiCredentials};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    netif::IpEvent,
    sys::EspError,
    wifi::{
        AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
        WifiEvent,
    },
};
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::net::Ipv4Addr;

#[cfg(target_os = "espidf")]
fn driver_err(e: EspError) -> NetError {
    NetError::Driver(e.code())
}

#[cfg(target_os = "espidf")]
fn auth_mode(method: Option<AuthMethod>) -> AuthMode {
    match method {
        None | Some(AuthMethod::None) => AuthMode::Open,
        Some(AuthMethod::WEP) => AuthMode::Wep,
        Some(AuthMethod::WPA) => AuthMode::WpaPersonal,
        Some(AuthMethod::WPA2Personal) => AuthMode::Wpa2Personal,
        Some(AuthMethod::WPAWPA2Personal) => AuthMode::WpaWpa2Personal,
        Some(AuthMethod::WPA2Enterprise) => AuthMode::Wpa2Enterprise,
        Some(AuthMethod::WPA3Personal) => AuthMode::Wpa3Personal,
        Some(AuthMethod::WPA2WPA3Personal) => AuthMode::Wpa2Wpa3Personal,
        Some(other) => AuthMode::Other(other as u8),
    }
}

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    _wifi_events: EspSubscription<'static, System>,
    #[cfg(target_os = "espidf")]
    _ip_events: EspSubscription<'static, System>,
    #[cfg(target_os = "espidf")]
    ap: Option<AccessPointConfiguration>,

    #[cfg(not(target_os = "espidf"))]
    events: Arc<NetEventQueue>,
    #[cfg(not(target_os = "espidf"))]
    station: Option<WifiCredentials>,
    #[cfg(not(target_os = "espidf"))]
    ap_up: bool,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        events: Arc<NetEventQueue>,
    ) -> Result<Self, NetError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), None).map_err(driver_err)?;

        let wifi_queue = events.clone();
        let wifi_events = sysloop
            .subscribe::<WifiEvent, _>(move |event| match event {
                WifiEvent::StaStarted { .. } => publish(&wifi_queue, NetEvent::StaStarted),
                WifiEvent::StaDisconnected { .. } => {
                    publish(&wifi_queue, NetEvent::StaDisconnected);
                }
                _ => {}
            })
            .map_err(driver_err)?;

        let ip_queue = events;
        let ip_events = sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned(assignment) = event {
                    publish(&ip_queue, NetEvent::GotIp(assignment.ip()));
                }
            })
            .map_err(driver_err)?;

        info!("WiFi: driver initialised");
        Ok(Self {
            wifi,
            _wifi_events: wifi_events,
            _ip_events: ip_events,
            ap: None,
        })
    }

    fn client_config(creds: &WifiCredentials) -> Result<ClientConfiguration, NetError> {
        Ok(ClientConfiguration {
            ssid: creds.ssid().try_into().map_err(|()| NetError::InvalidConfig)?,
            password: creds
                .password()
                .try_into()
                .map_err(|()| NetError::InvalidConfig)?,
            auth_method: if creds.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        })
    }

    fn apply(&mut self, client: ClientConfiguration) -> Result<(), NetError> {
        let config = match &self.ap {
            Some(ap) => Configuration::Mixed(client, ap.clone()),
            None => Configuration::Client(client),
        };
        self.wifi.set_configuration(&config).map_err(driver_err)
    }
}

#[cfg(target_os = "espidf")]
impl WifiPort for WifiAdapter {
    fn start_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.ap = None;
        self.apply(Self::client_config(creds)?)?;
        self.wifi.start().map_err(driver_err)?;
        info!("WiFi: station started for '{}'", creds.ssid());
        Ok(())
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetError> {
        let ap_config = AccessPointConfiguration {
            ssid: ap.ssid.as_str().try_into().map_err(|()| NetError::InvalidConfig)?,
            channel: ap.channel,
            auth_method: AuthMethod::None,
            max_connections: u16::from(ap.max_clients),
            ..Default::default()
        };
        self.ap = Some(ap_config);

        // A failed stored connection may have left the station running.
        if self.wifi.is_started().unwrap_or(false) {
            if let Err(e) = self.wifi.stop() {
                warn!("WiFi: stop before AP start failed ({})", e);
            }
        }
        self.apply(ClientConfiguration::default())?;
        self.wifi.start().map_err(driver_err)?;
        info!("WiFi: AP '{}' up (AP+STA)", ap.ssid);
        Ok(())
    }

    fn configure_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.apply(Self::client_config(creds)?)
    }

    fn connect(&mut self) -> Result<(), NetError> {
        self.wifi.connect().map_err(driver_err)
    }

    fn disconnect(&mut self) -> Result<(), NetError> {
        self.wifi.disconnect().map_err(driver_err)
    }

    fn scan(&mut self) -> Result<Vec<ScanEntry>, NetError> {
        let found = self.wifi.scan().map_err(driver_err)?;
        Ok(found
            .iter()
            .map(|ap| ScanEntry::new(ap.ssid.as_str(), ap.signal_strength, auth_mode(ap.auth_method)))
            .collect())
    }

    fn set_station_only(&mut self) -> Result<(), NetError> {
        let client = match self.wifi.get_configuration().map_err(driver_err)? {
            Configuration::Mixed(client, _) | Configuration::Client(client) => client,
            _ => ClientConfiguration::default(),
        };
        self.ap = None;
        self.apply(client)?;
        info!("WiFi: AP stopped, station only");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_STATION_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new(events: Arc<NetEventQueue>) -> Self {
        info!("WiFi(sim): simulated radio");
        Self {
            events,
            station: None,
            ap_up: false,
        }
    }

    pub fn ap_up(&self) -> bool {
        self.ap_up
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiPort for WifiAdapter {
    fn start_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.station = Some(creds.clone());
        publish(&self.events, NetEvent::StaStarted);
        Ok(())
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetError> {
        info!("WiFi(sim): AP '{}' up", ap.ssid);
        self.ap_up = true;
        Ok(())
    }

    fn configure_station(&mut self, creds: &WifiCredentials) -> Result<(), NetError> {
        self.station = Some(creds.clone());
        Ok(())
    }

    fn connect(&mut self) -> Result<(), NetError> {
        if self.station.is_none() {
            return Err(NetError::InvalidConfig);
        }
        publish(&self.events, NetEvent::GotIp(SIM_STATION_IP));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), NetError> {
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ScanEntry>, NetError> {
        Ok(vec![
            ScanEntry::new("SimHome", -48, AuthMode::Wpa2Personal),
            ScanEntry::new("SimCafe", -72, AuthMode::Open),
        ])
    }

    fn set_station_only(&mut self) -> Result<(), NetError> {
        self.ap_up = false;
        Ok(())
    }
}
