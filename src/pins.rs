//! GPIO pin assignments for the Streak Tracker board (ESP32-C6-DevKitC-1).
//!
//! Single source of truth: `main` references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Streak LEDs (active HIGH, LED i mirrors streak bit i)
// ---------------------------------------------------------------------------

/// LED row, oldest day first.  Index 6 is "today".
pub const LED_GPIOS: [i32; 7] = [0, 1, 2, 3, 4, 5, 6];

// ---------------------------------------------------------------------------
// Buttons (active LOW, internal pull-up)
// ---------------------------------------------------------------------------

/// Streak toggle button.
pub const BUTTON_GPIO: i32 = 7;

/// On-board BOOT button, doubles as hold-to-factory-reset.
pub const RESET_BUTTON_GPIO: i32 = 9;
