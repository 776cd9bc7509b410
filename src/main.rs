//! Streak Tracker Firmware: Main Entry Point
//!
//! Hexagonal architecture: adapters are built here and moved into the
//! [`StreakDevice`], which runs boot and then the 10 ms steady loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter   WifiAdapter   HttpClientAdapter   SystemClock    │
//! │  (Storage)    (Wifi)        (HttpClient)        (Clock)        │
//! │  HmacSigner   GpioBoard     LogEventSink                       │
//! │  (Signer)     (Board)       (EventSink)                        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  StreakDevice: streak · provisioning · time · webhook  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyInputPin, Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use log::info;

use streak::adapters::board::GpioBoard;
use streak::adapters::device_id;
use streak::adapters::hmac::HmacSigner;
use streak::adapters::http_client::HttpClientAdapter;
use streak::adapters::log_sink::LogEventSink;
use streak::adapters::nvs::NvsAdapter;
use streak::adapters::time::SystemClock;
use streak::adapters::wifi::WifiAdapter;
use streak::app::service::{DevicePorts, StreakDevice};
use streak::config::DeviceConfig;
use streak::error::Error;
use streak::pins;
use streak::provisioning::link::net_event_queue;

fn button(pin: AnyInputPin) -> Result<PinDriver<'static, AnyInputPin, Input>> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    Ok(driver)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Streak Tracker v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = DeviceConfig::default();
    config.validate().map_err(Error::Config)?;

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let p = peripherals.pins;

    info!(
        "Pins: LEDs {:?}, button GPIO{}, reset GPIO{}",
        pins::LED_GPIOS,
        pins::BUTTON_GPIO,
        pins::RESET_BUTTON_GPIO
    );
    let leds = [
        PinDriver::output(p.gpio0.downgrade_output())?,
        PinDriver::output(p.gpio1.downgrade_output())?,
        PinDriver::output(p.gpio2.downgrade_output())?,
        PinDriver::output(p.gpio3.downgrade_output())?,
        PinDriver::output(p.gpio4.downgrade_output())?,
        PinDriver::output(p.gpio5.downgrade_output())?,
        PinDriver::output(p.gpio6.downgrade_output())?,
    ];
    let board = GpioBoard::new(
        leds,
        button(p.gpio7.downgrade_input())?,
        button(p.gpio9.downgrade_input())?,
    );

    // ── 3. Adapters ───────────────────────────────────────────
    let events = net_event_queue();
    let storage = NvsAdapter::new().map_err(Error::from)?;
    let wifi = WifiAdapter::new(peripherals.modem, sysloop, events.clone()).map_err(Error::from)?;

    let ports = DevicePorts {
        storage,
        wifi,
        http: HttpClientAdapter::new(),
        clock: SystemClock::new(),
        signer: HmacSigner::efuse(),
        board,
    };

    // ── 4. Boot + steady loop ─────────────────────────────────
    let mac = device_id::read_mac();
    let mut sink = LogEventSink::new();
    let mut device = StreakDevice::new(config, &mac, ports, events);
    device.boot(&mut sink)?;
    device.run(&mut sink)
}
