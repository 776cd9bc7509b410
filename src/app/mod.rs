//! Application core: domain logic behind port traits.
//!
//! This module contains the business rules of the Streak Tracker: the
//! seven-day streak model, time synchronisation, the signed webhook and
//! the device orchestrator.  All interaction with hardware and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
pub mod streak;
pub mod time_sync;
pub mod webhook;
