//! Integration tests for the captive-portal onboarding flow.
//!
//! A real portal (DNS over UDP, HTTP over TCP) runs on its own thread
//! exactly as on the device; a client thread talks to it through plain
//! sockets while the controller drives mock WiFi and storage on the
//! test thread.

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;

use streak::adapters::time::SystemClock;
use streak::app::streak::STREAK_NAMESPACE;
use streak::app::ports::ClockPort;
use streak::config::DeviceConfig;
use streak::provisioning::link::{LinkMonitor, LinkStatus, net_event_queue};
use streak::provisioning::{
    OnboardingPorts, ProvisioningController, ProvisioningOutcome, WIFI_NAMESPACE, WifiCredentials,
};

use crate::client::{dns_exchange, dns_query, get, json_body, post, test_config};
use crate::mock_hw::{MockBoard, MockClock, MockNvs, MockWifi, WifiCall};

const CLAIM: &str = "4PDZ66BAAA";
const GOOD: &str = r#"{"ssid":"Home","password":"secret123"}"#;

struct Rig {
    wifi: MockWifi,
    storage: MockNvs,
    board: MockBoard,
    link: LinkMonitor,
}

impl Rig {
    fn new() -> Self {
        let q = net_event_queue();
        Self {
            wifi: MockWifi::new(q.clone()).accepting("Home", "secret123"),
            storage: MockNvs::new(),
            board: MockBoard::new(),
            link: LinkMonitor::new(q, 5),
        }
    }

    /// Run one portal session; `client` gets the DNS and HTTP addresses
    /// and must end the flow (connect or reset).
    fn provision<T, F>(&mut self, client: F) -> (ProvisioningOutcome, T)
    where
        F: FnOnce(SocketAddr, SocketAddr) -> T + Send + 'static,
        T: Send + 'static,
    {
        let config = test_config();
        let clock = SystemClock::new();
        let mut controller = ProvisioningController::new(&config, CLAIM);

        let session = controller.start_session(&mut self.wifi).unwrap();
        let (dns, http) = (session.dns_addr(), session.http_addr());
        let handle = thread::spawn(move || client(dns, http));

        let outcome = {
            let mut ports = OnboardingPorts {
                wifi: &mut self.wifi,
                storage: &mut self.storage,
                clock: &clock,
                board: &mut self.board,
            };
            controller.drive_session(&session, &mut self.link, &mut ports)
        };
        controller.finish_session(session, &mut self.wifi, &mut self.board);
        (outcome, handle.join().unwrap())
    }

    /// Try the stored network once on a virtual clock starting at zero.
    fn stored_attempt(&mut self, clock: &MockClock) -> bool {
        let config = DeviceConfig::default();
        let mut controller = ProvisioningController::new(&config, CLAIM);
        let mut ports = OnboardingPorts {
            wifi: &mut self.wifi,
            storage: &mut self.storage,
            clock,
            board: &mut self.board,
        };
        controller.attempt_stored_connection(&mut self.link, &mut ports)
    }
}

#[test]
fn connect_persists_credentials_and_returns_claim_code() {
    let mut rig = Rig::new();

    let (outcome, (scan, reply)) = rig.provision(|_, http| {
        let scan = get(http.port(), "/api/scan");
        let reply = post(http.port(), "/api/connect", GOOD);
        (scan, reply)
    });

    assert!(scan.starts_with("HTTP/1.1 200"));
    let networks = json_body(&scan)["networks"].as_array().unwrap().clone();
    assert_eq!(networks.len(), 2, "hidden SSID is skipped");
    assert_eq!(networks[0]["ssid"], "Home");
    assert_eq!(networks[0]["rssi"], 4);
    assert_eq!(networks[0]["auth"], 3);
    assert_eq!(networks[1]["ssid"], "Cafe");
    assert_eq!(networks[1]["rssi"], 1);
    assert_eq!(networks[1]["auth"], 0);

    assert!(reply.starts_with("HTTP/1.1 200"), "reply: {reply}");
    let body = json_body(&reply);
    assert_eq!(body["success"], true);
    assert_eq!(body["claim_code"], CLAIM);

    let expected = WifiCredentials::new("Home", "secret123").unwrap();
    assert_eq!(outcome, ProvisioningOutcome::Provisioned(expected.clone()));
    assert_eq!(WifiCredentials::load(&rig.storage), Some(expected));
    assert!(rig.link.is_connected());

    assert!(matches!(rig.wifi.calls.first(), Some(WifiCall::StartAccessPoint(s)) if s == "StreakTracker"));
    assert_eq!(rig.wifi.calls.last(), Some(&WifiCall::StationOnly));
    assert_eq!(rig.board.leds, 0, "animation cleared on exit");
}

#[test]
fn rejected_requests_leave_storage_and_radio_alone() {
    let mut rig = Rig::new();

    let (outcome, replies) = rig.provision(|_, http| {
        let p = http.port();
        let missing = post(p, "/api/connect", r#"{"password":"x"}"#);
        let garbage = post(p, "/api/connect", "not json");
        let wrong = post(p, "/api/connect", r#"{"ssid":"Home","password":"nope"}"#);
        let good = post(p, "/api/connect", GOOD);
        [missing, garbage, wrong, good]
    });
    let [missing, garbage, wrong, good] = replies;

    assert!(missing.starts_with("HTTP/1.1 200"));
    assert_eq!(json_body(&missing)["success"], false);
    assert_eq!(json_body(&missing)["error"], "No SSID provided");

    assert!(garbage.starts_with("HTTP/1.1 400"));
    assert_eq!(json_body(&garbage)["error"], "Invalid request");

    assert_eq!(json_body(&wrong)["success"], false);
    assert_eq!(json_body(&wrong)["error"], "Failed to connect to network");

    assert_eq!(json_body(&good)["success"], true);
    assert!(matches!(outcome, ProvisioningOutcome::Provisioned(_)));

    assert_eq!(rig.storage.commits, 1, "only the verified network is stored");
    let configured: Vec<&WifiCall> = rig
        .wifi
        .calls
        .iter()
        .filter(|c| matches!(c, WifiCall::ConfigureStation(_)))
        .collect();
    assert_eq!(configured.len(), 2, "invalid requests never reach the radio");
}

#[test]
fn dns_points_every_name_at_the_portal() {
    let mut rig = Rig::new();

    let (_, (answer, short)) = rig.provision(|dns, http| {
        let answer = dns_exchange(dns, &dns_query(0xBEEF, "connectivitycheck.gstatic.com"));
        let short = dns_exchange(dns, &[0x12, 0x34, 0x01]);
        post(http.port(), "/api/connect", GOOD);
        (answer, short)
    });

    let answer = answer.expect("query answered");
    assert_eq!(&answer[..2], &[0xBE, 0xEF], "transaction id echoed");
    assert_eq!(u16::from_be_bytes([answer[6], answer[7]]), 1, "one answer");
    assert_eq!(&answer[answer.len() - 4..], &Ipv4Addr::new(192, 168, 4, 1).octets());
    assert!(short.is_none(), "runt datagram dropped");
}

#[test]
fn connectivity_checks_redirect_and_root_serves_page() {
    let mut rig = Rig::new();

    let (_, (check, page, other)) = rig.provision(|_, http| {
        let p = http.port();
        let check = get(p, "/generate_204");
        let page = get(p, "/");
        let other = crate::client::exchange(p, b"PUT /api/scan HTTP/1.1\r\n\r\n");
        post(p, "/api/connect", GOOD);
        (check, page, other)
    });

    assert!(check.starts_with("HTTP/1.1 302"));
    assert!(check.contains("Location: http://192.168.4.1/\r\n"));
    assert!(page.starts_with("HTTP/1.1 200"));
    assert!(page.contains("text/html"));
    assert!(page.contains("/api/connect"));
    assert!(other.starts_with("HTTP/1.1 404"));
}

#[test]
fn portal_reset_wipes_storage() {
    let mut rig = Rig::new();
    rig.storage.put_str(WIFI_NAMESPACE, "ssid", "Old");
    rig.storage.put_u8(STREAK_NAMESPACE, "data", 0b101_0101);

    let (outcome, reply) = rig.provision(|_, http| post(http.port(), "/api/reset", ""));

    assert_eq!(json_body(&reply)["success"], true);
    assert_eq!(outcome, ProvisioningOutcome::FactoryReset);
    assert!(rig.storage.namespace_empty(WIFI_NAMESPACE));
    assert!(rig.storage.namespace_empty(STREAK_NAMESPACE));
}

#[test]
fn stored_connection_succeeds_with_accepted_password() {
    let mut rig = Rig::new();
    WifiCredentials::new("Home", "secret123")
        .unwrap()
        .save(&mut rig.storage)
        .unwrap();
    let clock = MockClock::new(0);

    assert!(rig.stored_attempt(&clock));
    assert_eq!(rig.link.status(), LinkStatus::Connected);
    assert_eq!(rig.wifi.calls[0], WifiCall::StartStation("Home".into()));
    assert_eq!(rig.wifi.connects(), 1);
}

#[test]
fn stored_connection_fails_after_retry_limit() {
    let mut rig = Rig::new();
    WifiCredentials::new("Home", "wrong")
        .unwrap()
        .save(&mut rig.storage)
        .unwrap();
    let clock = MockClock::new(0);

    assert!(!rig.stored_attempt(&clock));
    assert_eq!(rig.link.status(), LinkStatus::Failed);
    assert_eq!(rig.link.retries(), 5);
    // One connect on station start, then one per retry.
    assert_eq!(rig.wifi.connects(), 6);
    assert!(clock.now_ms() < 15_000, "gave up on the retry limit, not the deadline");
    assert!(
        WifiCredentials::load(&rig.storage).is_some(),
        "a failed attempt keeps the stored network"
    );
}

#[test]
fn stored_connection_times_out_without_driver_events() {
    let mut rig = Rig::new();
    rig.wifi.silent = true;
    WifiCredentials::new("Home", "secret123")
        .unwrap()
        .save(&mut rig.storage)
        .unwrap();
    let clock = MockClock::new(0);

    assert!(!rig.stored_attempt(&clock));
    assert_eq!(rig.link.status(), LinkStatus::Pending);
    assert!(clock.now_ms() >= 15_000);
    assert!(clock.now_ms() < 15_000 + 100, "stopped right after the deadline");
    assert_eq!(rig.wifi.connects(), 1);
}

#[test]
fn no_stored_network_skips_the_radio() {
    let mut rig = Rig::new();
    let clock = MockClock::new(0);

    assert!(!rig.stored_attempt(&clock));
    assert!(rig.wifi.calls.is_empty());
    assert_eq!(clock.now_ms(), 0);
}
