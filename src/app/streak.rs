//! Seven-day streak model and its persistence.
//!
//! ```text
//!   bit:   6      5      4      3      2      1      0
//!        today  -1d    -2d    -3d    -4d    -5d    -6d (oldest)
//! ```
//!
//! "Today" is bit 6 of the mapping itself, so the today flag and the
//! mapping cannot disagree.  A shift moves every day one slot towards
//! bit 0, drops the oldest and starts the new day unset.
//!
//! Persistence uses the NVS namespace `streak`: `data` (u8) holds the
//! mapping and `lastDay` (i32) the day-of-year it belongs to.  Both keys
//! are written with one commit.

use log::{info, warn};

use super::ports::{StorageError, StoragePort, StoredValue};

pub const STREAK_NAMESPACE: &str = "streak";
const DATA_KEY: &str = "data";
const LAST_DAY_KEY: &str = "lastDay";

/// Number of tracked days.
pub const TRACKED_DAYS: u8 = 7;
const TODAY_BIT: u8 = 1 << 6;
const MAPPING_MASK: u8 = 0x7F;

/// The current local day as the rollover logic sees it.
///
/// Only the day-of-year is persisted, so the length of the previous year
/// travels with the current day to count gaps across New Year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDay {
    /// 0-based day-of-year.
    pub ordinal: u16,
    /// 365, or 366 when the previous year was a leap year.
    pub prior_year_days: u16,
}

impl LocalDay {
    pub const fn new(ordinal: u16, prior_year_days: u16) -> Self {
        Self {
            ordinal,
            prior_year_days,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// StreakState (pure)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    mapping: u8,
    /// Day-of-year (0-based) the mapping was last aligned to, -1 = unknown.
    last_recorded_day: i32,
}

impl StreakState {
    /// Fresh state: no days recorded, day unknown.
    pub const fn new() -> Self {
        Self {
            mapping: 0,
            last_recorded_day: -1,
        }
    }

    /// Rebuild from persisted values; bits above bit 6 are discarded.
    pub const fn from_raw(mapping: u8, last_recorded_day: i32) -> Self {
        Self {
            mapping: mapping & MAPPING_MASK,
            last_recorded_day,
        }
    }

    pub const fn mapping(&self) -> u8 {
        self.mapping
    }

    pub const fn today(&self) -> bool {
        self.mapping & TODAY_BIT != 0
    }

    pub fn last_recorded_day(&self) -> Option<u16> {
        u16::try_from(self.last_recorded_day).ok()
    }

    /// Flip today's bit.  Returns the new today value.
    pub fn toggle_today(&mut self) -> bool {
        self.mapping ^= TODAY_BIT;
        self.today()
    }

    /// Advance one day.
    pub fn shift(&mut self) {
        self.mapping = (self.mapping >> 1) & !TODAY_BIT;
    }

    /// Align the mapping with `today`.
    ///
    /// Returns the number of shifts applied.  An unknown previous day
    /// only records `today`.
    pub fn reconcile(&mut self, today: LocalDay) -> u8 {
        let current = i32::from(today.ordinal);
        let Some(last) = self.last_recorded_day() else {
            self.last_recorded_day = current;
            return 0;
        };
        if last == today.ordinal {
            return 0;
        }
        let shifts = days_elapsed(last, today).min(u32::from(TRACKED_DAYS)) as u8;
        for _ in 0..shifts {
            self.shift();
        }
        self.last_recorded_day = current;
        shifts
    }
}

impl Default for StreakState {
    fn default() -> Self {
        Self::new()
    }
}

/// Days from day-of-year `last` to `today`.
///
/// A smaller ordinal means New Year passed in between, and the gap is
/// counted through the end of the previous year.  Never 0 for two
/// different days.
pub fn days_elapsed(last: u16, today: LocalDay) -> u32 {
    let (last, current) = (u32::from(last), u32::from(today.ordinal));
    if current >= last {
        return current - last;
    }
    (u32::from(today.prior_year_days) + current)
        .saturating_sub(last)
        .max(1)
}

// ───────────────────────────────────────────────────────────────
// StreakStore (state + persistence)
// ───────────────────────────────────────────────────────────────

/// Owns the streak state and keeps NVS in step with every mutation.
///
/// Storage failures are logged and the in-memory state keeps going; the
/// worst case after a power cut is losing the last mutation.
#[derive(Debug, Default)]
pub struct StreakStore {
    state: StreakState,
}

impl StreakStore {
    /// Load the persisted state, falling back to a fresh one.
    pub fn load(storage: &impl StoragePort) -> Self {
        let mapping = match storage.read_u8(STREAK_NAMESPACE, DATA_KEY) {
            Ok(mapping) => mapping,
            Err(StorageError::NotFound) => 0,
            Err(e) => {
                warn!("Streak: load failed ({}), starting empty", e);
                return Self::default();
            }
        };

        let last_day = match storage.read_i32(STREAK_NAMESPACE, LAST_DAY_KEY) {
            Ok(day) => day,
            Err(StorageError::NotFound) => -1,
            Err(e) => {
                warn!("Streak: lastDay unreadable ({}), treating as unknown", e);
                -1
            }
        };

        let state = StreakState::from_raw(mapping, last_day);
        info!(
            "Streak: loaded {:07b} (today={}, lastDay={})",
            state.mapping(),
            state.today(),
            last_day
        );
        Self { state }
    }

    pub fn state(&self) -> StreakState {
        self.state
    }

    /// Flip today's bit and persist.  Returns the new today value.
    pub fn toggle_today(&mut self, storage: &mut impl StoragePort) -> bool {
        let today = self.state.toggle_today();
        self.persist(storage);
        info!(
            "Streak: today toggled {} | {:07b}",
            if today { "ON" } else { "OFF" },
            self.state.mapping()
        );
        today
    }

    /// Advance one day and persist.
    pub fn shift(&mut self, storage: &mut impl StoragePort) {
        self.state.shift();
        self.persist(storage);
        info!("Streak: after shift {:07b}", self.state.mapping());
    }

    /// Apply any missed day rollovers up to `today` and persist.
    /// Returns the number of shifts applied.
    pub fn reconcile(&mut self, today: LocalDay, storage: &mut impl StoragePort) -> u8 {
        let before = self.state;
        let shifts = self.state.reconcile(today);
        if self.state != before {
            self.persist(storage);
        }
        if shifts > 0 {
            info!(
                "Streak: {} day(s) rolled over, now {:07b} (day {})",
                shifts,
                self.state.mapping(),
                today.ordinal
            );
        }
        shifts
    }

    /// Forget everything (after a factory reset wiped storage).
    pub fn clear(&mut self) {
        self.state = StreakState::new();
    }

    fn persist(&self, storage: &mut impl StoragePort) {
        let data = StoredValue::U8(self.state.mapping());
        let result = match self.state.last_recorded_day {
            -1 => storage.write_entries(STREAK_NAMESPACE, &[(DATA_KEY, data)]),
            day => storage.write_entries(
                STREAK_NAMESPACE,
                &[(DATA_KEY, data), (LAST_DAY_KEY, StoredValue::I32(day))],
            ),
        };
        if let Err(e) = result {
            warn!("Streak: save failed ({}), keeping in-memory state", e);
        }
    }
}
