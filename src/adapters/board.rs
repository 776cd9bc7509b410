//! GPIO board adapter.
//!
//! Implements [`BoardPort`] over any `embedded-hal` pins: seven push-pull
//! LED outputs (active HIGH) and two buttons wired to ground with pull-ups
//! (active LOW).  On ESP-IDF the pins are `PinDriver`s built in `main`;
//! tests drive the same adapter with in-memory pins.

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::app::ports::BoardPort;
use crate::drivers::led_patterns::LED_COUNT;

pub struct GpioBoard<L, I> {
    leds: [L; LED_COUNT],
    button: I,
    reset_button: I,
    /// Last mask written, to skip redundant GPIO writes.
    shown: Option<u8>,
}

impl<L: OutputPin, I: InputPin> GpioBoard<L, I> {
    pub fn new(leds: [L; LED_COUNT], button: I, reset_button: I) -> Self {
        Self {
            leds,
            button,
            reset_button,
            shown: None,
        }
    }
}

impl<L: OutputPin, I: InputPin> BoardPort for GpioBoard<L, I> {
    fn set_leds(&mut self, mask: u8) {
        if self.shown == Some(mask) {
            return;
        }
        for (i, led) in self.leds.iter_mut().enumerate() {
            let result = if mask & (1 << i) != 0 {
                led.set_high()
            } else {
                led.set_low()
            };
            if result.is_err() {
                warn!("Board: LED {} write failed", i);
            }
        }
        self.shown = Some(mask);
    }

    fn button_pressed(&mut self) -> bool {
        self.button.is_low().unwrap_or(false)
    }

    fn reset_button_pressed(&mut self) -> bool {
        self.reset_button.is_low().unwrap_or(false)
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        log::info!("Board: restarting");
        esp_idf_svc::hal::reset::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        log::info!("Board(sim): restart requested");
        self.shown = None;
    }
}
