//! Whole-device scenarios: boot, button, webhook, rollover, reset.

use std::thread;

use streak::adapters::time::SystemClock;
use streak::app::events::{AppEvent, StreakCause};
use streak::app::ports::NetError;
use streak::app::service::{DevicePorts, StreakDevice};
use streak::app::streak::STREAK_NAMESPACE;
use streak::app::webhook::{DeliveryOutcome, SIGNATURE_HEADER, signature_hex};
use streak::config::DeviceConfig;
use streak::provisioning::link::{NetEvent, net_event_queue, publish};
use streak::provisioning::{WIFI_NAMESPACE, WifiCredentials};

use crate::client::{free_tcp_port, json_body, post};
use crate::harness::{
    DAY, JAN_1_2025, KEY, MAC, Setup, press, run_for, step, stored_last_day, stored_mapping,
};
use crate::mock_hw::{
    MockBoard, MockHttp, MockNvs, MockSigner, MockWifi, RecordingSink, Stored, WifiCall,
};

/// 2025-01-01 23:59:50 UTC
const BEFORE_MIDNIGHT: i64 = JAN_1_2025 + DAY - 10;

#[test]
fn press_then_midnight() {
    let (mut device, _q, mut sink) = Setup::provisioned(BEFORE_MIDNIGHT).boot();

    assert_eq!(device.claim_code(), "4PDZ66BAAA");
    assert_eq!(device.mac(), "AA:BB:CC:DD:EE:FF");
    assert_eq!(
        sink.events[0],
        AppEvent::Booted {
            mac: "AA:BB:CC:DD:EE:FF".into(),
            claim_code: "4PDZ66BAAA".into(),
            signing: true,
        }
    );
    assert!(sink.contains(&AppEvent::WifiConnected { provisioned: false }));
    assert!(sink.contains(&AppEvent::TimeSynced {
        offset_secs: 0,
        day_of_year: 0
    }));
    assert!(device.is_connected());
    assert_eq!(device.streak_state().mapping(), 0);

    press(&mut device, &mut sink);

    assert_eq!(device.streak_state().mapping(), 0b100_0000);
    assert_eq!(device.ports().board.leds, 0b100_0000);
    assert_eq!(stored_mapping(&device.ports().storage), Some(0b100_0000));

    let posts = device.ports().http.posts();
    assert_eq!(posts.len(), 1);
    let hook = posts[0];
    assert_eq!(hook.url, DeviceConfig::default().webhook_url);
    assert_eq!(hook.header("Content-Type"), Some("application/json"));
    let body = hook.json();
    assert_eq!(body["mac"], "AA:BB:CC:DD:EE:FF");
    assert_eq!(body["state"], true);
    assert_eq!(body["date"], "2025-01-01");
    assert!(body["timestamp"].as_i64().unwrap() >= BEFORE_MIDNIGHT);
    assert_eq!(
        hook.header(SIGNATURE_HEADER),
        Some(signature_hex(&hmac_sha256::HMAC::mac(&hook.body, KEY)).as_str())
    );
    assert!(sink.contains(&AppEvent::Webhook(DeliveryOutcome::Delivered {
        status: 200,
        signed: true
    })));

    // Past midnight.
    run_for(&mut device, &mut sink, 10_000);

    assert_eq!(device.streak_state().mapping(), 0b010_0000);
    assert!(!device.streak_state().today());
    assert_eq!(device.ports().board.leds, 0b010_0000);
    assert!(sink.contains(&AppEvent::StreakChanged {
        mapping: 0b010_0000,
        cause: StreakCause::Rolled { shifts: 1 },
    }));
    assert_eq!(stored_mapping(&device.ports().storage), Some(0b010_0000));
    assert_eq!(stored_last_day(&device.ports().storage), Some(1));
}

#[test]
fn second_press_clears_today_and_reports_false() {
    let (mut device, _q, mut sink) = Setup::provisioned(JAN_1_2025 + 3600).boot();

    press(&mut device, &mut sink);
    press(&mut device, &mut sink);

    assert_eq!(device.streak_state().mapping(), 0);
    let posts = device.ports().http.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].json()["state"], false);
}

#[test]
fn held_button_counts_once() {
    let (mut device, _q, mut sink) = Setup::provisioned(JAN_1_2025 + 3600).boot();

    device.ports_mut().board.button = true;
    run_for(&mut device, &mut sink, 2_000);

    assert_eq!(device.streak_state().mapping(), 0b100_0000);
    assert_eq!(device.ports().http.posts().len(), 1);
}

#[test]
fn webhook_skipped_without_link() {
    let (mut device, q, mut sink) = Setup::provisioned(JAN_1_2025 + 3600).boot();

    device.ports_mut().wifi.accepted.clear();
    publish(&q, NetEvent::StaDisconnected);
    step(&mut device, &mut sink);
    assert!(!device.is_connected());

    press(&mut device, &mut sink);

    assert_eq!(device.streak_state().mapping(), 0b100_0000);
    assert!(device.ports().http.posts().is_empty());
    assert!(sink.contains(&AppEvent::Webhook(DeliveryOutcome::Skipped)));
}

#[test]
fn missing_key_sends_unsigned() {
    let mut setup = Setup::provisioned(JAN_1_2025 + 3600);
    setup.signer = MockSigner::unkeyed();
    let (mut device, _q, mut sink) = setup.boot();

    assert!(!device.signing_enabled());
    assert!(matches!(
        sink.events[0],
        AppEvent::Booted { signing: false, .. }
    ));

    press(&mut device, &mut sink);

    let posts = device.ports().http.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].header(SIGNATURE_HEADER), None);
}

#[test]
fn webhook_failure_is_swallowed() {
    let mut setup = Setup::provisioned(JAN_1_2025 + 3600);
    setup.http.webhook = Err(NetError::Timeout);
    let (mut device, _q, mut sink) = setup.boot();

    press(&mut device, &mut sink);

    assert_eq!(device.streak_state().mapping(), 0b100_0000);
    assert_eq!(device.ports().http.posts().len(), 1, "no retry");
    assert!(sink.contains(&AppEvent::Webhook(DeliveryOutcome::Failed(
        NetError::Timeout
    ))));
}

#[test]
fn geolocation_failure_falls_back_to_utc() {
    let mut setup = Setup::provisioned(JAN_1_2025 + 3600);
    setup.http = MockHttp::offline();
    let (device, _q, sink) = setup.boot();

    assert!(device.time_synced());
    assert!(sink.contains(&AppEvent::TimeSynced {
        offset_secs: 0,
        day_of_year: 0
    }));
}

#[test]
fn offset_moves_the_local_day() {
    // 2025-01-01 23:00 UTC is already 2 January at UTC+2.
    let mut setup = Setup::provisioned(JAN_1_2025 + 23 * 3600);
    setup.http = MockHttp::with_offset(7_200);
    let (device, _q, sink) = setup.boot();

    assert!(sink.contains(&AppEvent::TimeSynced {
        offset_secs: 7_200,
        day_of_year: 1
    }));
    assert_eq!(stored_last_day(&device.ports().storage), Some(1));
}

#[test]
fn failed_sync_disables_rollover_until_late_sync() {
    let mut setup = Setup::provisioned(BEFORE_MIDNIGHT);
    setup.storage.put_u8(STREAK_NAMESPACE, "data", 0b111_1111);
    setup.storage.put_i32(STREAK_NAMESPACE, "lastDay", 0);
    setup.clock.sntp_works = false;
    let (mut device, _q, mut sink) = setup.boot();

    assert!(sink.contains(&AppEvent::TimeSyncFailed));
    assert!(!device.time_synced());

    run_for(&mut device, &mut sink, 2_000);
    assert_eq!(device.streak_state().mapping(), 0b111_1111, "no rollover unsynced");

    device.ports_mut().clock.sntp_works = true;
    step(&mut device, &mut sink);

    assert!(device.time_synced());
    assert!(
        sink.events
            .iter()
            .any(|e| matches!(e, AppEvent::TimeSynced { day_of_year: 1, .. }))
    );
    assert_eq!(device.streak_state().mapping(), 0b011_1111);
}

#[test]
fn local_time_logged_every_ten_seconds() {
    let (mut device, _q, mut sink) = Setup::provisioned(JAN_1_2025 + 12 * 3600).boot();

    run_for(&mut device, &mut sink, 25_000);

    let logs: Vec<&String> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::LocalTime { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].starts_with("2025-01-01 12:00:1"));
    assert!(logs[0].ends_with("(UTC+0.0)"));
}

#[test]
fn holding_reset_wipes_and_restarts() {
    let mut setup = Setup::provisioned(JAN_1_2025 + 3600);
    setup.storage.put_u8(STREAK_NAMESPACE, "data", 0b000_0111);
    let (mut device, _q, mut sink) = setup.boot();

    device.ports_mut().board.reset_button = true;
    run_for(&mut device, &mut sink, 5_100);

    let countdown: Vec<u8> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ResetCountdown { seconds_left } => Some(*seconds_left),
            _ => None,
        })
        .collect();
    assert_eq!(countdown, [5, 4, 3, 2, 1]);
    assert!(sink.contains(&AppEvent::FactoryReset));

    assert!(device.restart_pending());
    let board = &device.ports().board;
    assert_eq!(board.restarts, 1);
    let flashes = board
        .led_history
        .windows(2)
        .filter(|w| w == &[0x7F, 0])
        .count();
    assert!(flashes >= 3);

    let storage = &device.ports().storage;
    assert!(storage.namespace_empty(WIFI_NAMESPACE));
    assert!(storage.namespace_empty(STREAK_NAMESPACE));
    assert_eq!(device.streak_state().mapping(), 0);
}

#[test]
fn releasing_reset_early_restores_streak() {
    let mut setup = Setup::provisioned(JAN_1_2025 + 3600);
    setup.storage.put_u8(STREAK_NAMESPACE, "data", 0b000_0101);
    let (mut device, _q, mut sink) = setup.boot();

    device.ports_mut().board.reset_button = true;
    run_for(&mut device, &mut sink, 2_500);
    assert_eq!(device.ports().board.leds, 0b000_0111, "2.5 s of 5 s lights 3 LEDs");

    device.ports_mut().board.reset_button = false;
    step(&mut device, &mut sink);

    assert!(sink.contains(&AppEvent::ResetCancelled));
    assert_eq!(device.ports().board.leds, 0b000_0101);
    assert_eq!(device.ports().board.restarts, 0);
    assert!(WifiCredentials::load(&device.ports().storage).is_some());
}

#[test]
fn first_boot_provisions_through_portal() {
    let port = free_tcp_port();
    let config = DeviceConfig {
        http_port: port,
        dns_port: 0,
        ..DeviceConfig::default()
    };

    let q = net_event_queue();
    let ports = DevicePorts {
        storage: MockNvs::new(),
        wifi: MockWifi::new(q.clone()).accepting("Home", "secret123"),
        http: MockHttp::with_offset(3_600),
        clock: SystemClock::new(),
        signer: MockSigner::keyed(KEY),
        board: MockBoard::new(),
    };
    let mut device = StreakDevice::new(config, &MAC, ports, q);

    let client = thread::spawn(move || {
        post(
            port,
            "/api/connect",
            r#"{"ssid":"Home","password":"secret123"}"#,
        )
    });

    let mut sink = RecordingSink::new();
    device.boot(&mut sink).unwrap();
    let reply = client.join().unwrap();

    assert_eq!(json_body(&reply)["claim_code"], "4PDZ66BAAA");
    assert!(sink.contains(&AppEvent::ProvisioningStarted));
    assert!(sink.contains(&AppEvent::WifiConnected { provisioned: true }));
    assert!(device.is_connected());
    assert!(device.time_synced());

    assert_eq!(
        device.ports().storage.get(WIFI_NAMESPACE, "ssid"),
        Some(&Stored::Str("Home".into()))
    );
}

#[test]
fn rejected_stored_password_falls_back_to_portal() {
    let port = free_tcp_port();
    let config = DeviceConfig {
        http_port: port,
        dns_port: 0,
        ..DeviceConfig::default()
    };

    let mut storage = MockNvs::new();
    WifiCredentials::new("Home", "wrong")
        .unwrap()
        .save(&mut storage)
        .unwrap();

    let q = net_event_queue();
    let ports = DevicePorts {
        storage,
        wifi: MockWifi::new(q.clone()).accepting("Home", "secret123"),
        http: MockHttp::with_offset(0),
        clock: SystemClock::new(),
        signer: MockSigner::keyed(KEY),
        board: MockBoard::new(),
    };
    let mut device = StreakDevice::new(config, &MAC, ports, q);

    let client = thread::spawn(move || {
        post(
            port,
            "/api/connect",
            r#"{"ssid":"Home","password":"secret123"}"#,
        )
    });

    let mut sink = RecordingSink::new();
    device.boot(&mut sink).unwrap();
    let reply = client.join().unwrap();
    assert_eq!(json_body(&reply)["success"], true);

    let calls = &device.ports().wifi.calls;
    assert_eq!(calls[0], WifiCall::StartStation("Home".into()));
    let ap_start = calls
        .iter()
        .position(|c| matches!(c, WifiCall::StartAccessPoint(_)))
        .expect("portal access point started");
    let stored_connects = calls[..ap_start]
        .iter()
        .filter(|c| **c == WifiCall::Connect)
        .count();
    assert_eq!(stored_connects, 6, "initial connect plus five retries");

    assert!(!sink.contains(&AppEvent::WifiConnected { provisioned: false }));
    let started = sink
        .events
        .iter()
        .position(|e| *e == AppEvent::ProvisioningStarted)
        .expect("provisioning started");
    let provisioned = sink
        .events
        .iter()
        .position(|e| *e == AppEvent::WifiConnected { provisioned: true })
        .expect("provisioned through the portal");
    assert!(started < provisioned);
    assert!(device.is_connected());

    assert_eq!(
        device.ports().storage.get(WIFI_NAMESPACE, "password"),
        Some(&Stored::Str("secret123".into()))
    );
}
