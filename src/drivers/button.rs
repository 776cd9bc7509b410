//! Polled button logic: press debouncing and the factory-reset hold.
//!
//! ## Hardware
//!
//! Active-low momentary switches with pull-ups; the board adapter inverts
//! the level so `true` always means "pressed".  Both state machines take
//! the raw level and a monotonic `now_ms` from the control loop, so they
//! run unchanged on the host.
//!
//! | Machine          | Input       | Output                                   |
//! |------------------|-------------|------------------------------------------|
//! | `ButtonDebouncer`| streak key  | `true` once per press, after 50 ms stable |
//! | `ResetHold`      | BOOT key    | countdown / cancel / trigger after 5 s   |

use super::led_patterns::{LED_COUNT, progress_mask};

/// Press-edge detector with a stability window.
#[derive(Debug, Clone)]
pub struct ButtonDebouncer {
    debounce_ms: u64,
    last_reading: bool,
    last_change_ms: u64,
    stable: bool,
}

impl ButtonDebouncer {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            debounce_ms: u64::from(debounce_ms),
            last_reading: false,
            last_change_ms: 0,
            stable: false,
        }
    }

    /// Feed one sample.  Returns `true` on the debounced press edge.
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        if pressed != self.last_reading {
            self.last_reading = pressed;
            self.last_change_ms = now_ms;
            return false;
        }

        if now_ms.saturating_sub(self.last_change_ms) < self.debounce_ms || pressed == self.stable
        {
            return false;
        }

        self.stable = pressed;
        pressed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldStatus {
    /// Key up, nothing in progress.
    Idle,
    /// Key just went down.
    Started,
    /// Key still down.  `countdown` is set when a new whole second starts.
    Progress { leds: u8, countdown: Option<u8> },
    /// Released before the hold time.
    Cancelled,
    /// Held for the full hold time.  Fires once per hold.
    Triggered,
}

/// Hold-to-reset tracker.
#[derive(Debug, Clone)]
pub struct ResetHold {
    hold_ms: u64,
    pressed_at: Option<u64>,
    last_countdown: Option<u8>,
    fired: bool,
}

impl ResetHold {
    pub fn new(hold_ms: u32) -> Self {
        Self {
            hold_ms: u64::from(hold_ms.max(1)),
            pressed_at: None,
            last_countdown: None,
            fired: false,
        }
    }

    pub fn is_holding(&self) -> bool {
        self.pressed_at.is_some() && !self.fired
    }

    pub fn update(&mut self, pressed: bool, now_ms: u64) -> HoldStatus {
        let Some(since) = self.pressed_at else {
            if pressed {
                self.pressed_at = Some(now_ms);
                self.last_countdown = None;
                self.fired = false;
                return HoldStatus::Started;
            }
            return HoldStatus::Idle;
        };

        if !pressed {
            self.pressed_at = None;
            return if self.fired {
                HoldStatus::Idle
            } else {
                HoldStatus::Cancelled
            };
        }
        if self.fired {
            return HoldStatus::Idle;
        }

        let elapsed = now_ms.saturating_sub(since);
        if elapsed >= self.hold_ms {
            self.fired = true;
            return HoldStatus::Triggered;
        }

        let lit = (elapsed * LED_COUNT as u64 / self.hold_ms) as u8;
        let seconds_left = (self.hold_ms - elapsed).div_ceil(1000) as u8;
        let countdown = if self.last_countdown == Some(seconds_left) {
            None
        } else {
            self.last_countdown = Some(seconds_left);
            Some(seconds_left)
        };

        HoldStatus::Progress {
            leds: progress_mask(lit),
            countdown,
        }
    }
}
