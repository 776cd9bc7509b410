//! Patterns for the 7-LED streak row.
//!
//! | Pattern       | Used during                      | Shape                         |
//! |---------------|----------------------------------|-------------------------------|
//! | Sweep         | connecting, captive portal       | one LED bouncing 0..6..0      |
//! | Progress      | factory-reset hold               | first n LEDs lit              |
//! | Flash         | factory-reset confirmed          | all on / all off, 3 times     |
//!
//! Masks use the streak layout: bit i drives LED i.

pub const LED_COUNT: usize = 7;
pub const ALL_LEDS: u8 = 0x7F;

/// Confirmation flashes before a factory reset.
pub const RESET_FLASHES: u8 = 3;
pub const FLASH_PERIOD_MS: u32 = 200;

/// One full bounce: 0→6 is 7 steps, 5→1 is 5 more.
const SWEEP_CYCLE: u32 = 12;

/// Mask with the first `n` LEDs lit (saturates at 7).
pub fn progress_mask(n: u8) -> u8 {
    if usize::from(n) >= LED_COUNT {
        ALL_LEDS
    } else {
        (1u8 << n) - 1
    }
}

/// Single lit LED for sweep step `index`.
pub fn sweep_mask(index: u32) -> u8 {
    let cycle = index % SWEEP_CYCLE;
    let led = if cycle < LED_COUNT as u32 {
        cycle
    } else {
        SWEEP_CYCLE - cycle
    };
    1 << led
}

/// Time-driven bouncing LED.  Call `tick` every loop iteration; a new
/// mask comes back once per step.
#[derive(Debug, Clone)]
pub struct SweepAnimation {
    step_ms: u64,
    last_step_ms: Option<u64>,
    index: u32,
}

impl SweepAnimation {
    pub fn new(step_ms: u32) -> Self {
        Self {
            step_ms: u64::from(step_ms),
            last_step_ms: None,
            index: 0,
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> Option<u8> {
        if let Some(last) = self.last_step_ms {
            if now_ms.saturating_sub(last) < self.step_ms {
                return None;
            }
        }
        self.last_step_ms = Some(now_ms);
        let mask = sweep_mask(self.index);
        self.index = self.index.wrapping_add(1);
        Some(mask)
    }

    pub fn reset(&mut self) {
        self.last_step_ms = None;
        self.index = 0;
    }
}
