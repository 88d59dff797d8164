//! Daily streak tracking.

use chrono::NaiveDate;

/// Result of registering activity on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current: u32,
    pub longest: u32,
    pub last_active: NaiveDate,
}

/// Streak after activity on `today`, given the previous activity day.
///
/// Days are compared as calendar dates. A `last_active` on or after `today`
/// leaves the streak untouched.
pub fn next_streak(last_active: Option<NaiveDate>, current: u32, today: NaiveDate) -> u32 {
    let Some(last_active) = last_active else {
        return 1;
    };

    match today.signed_duration_since(last_active).num_days() {
        1 => current.saturating_add(1),
        days if days <= 0 => current,
        _ => 1,
    }
}

/// Applies activity on `today`. `last_active` always becomes `today`, even
/// when the stored day was ahead of it.
pub fn register_activity(
    last_active: Option<NaiveDate>,
    current: u32,
    longest: u32,
    today: NaiveDate,
) -> StreakUpdate {
    let current = next_streak(last_active, current, today);
    StreakUpdate {
        current,
        longest: longest.max(current),
        last_active: today,
    }
}
