//! Button state machines and LED row patterns.

pub mod button;
pub mod led_patterns;
