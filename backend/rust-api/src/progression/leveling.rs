//! XP rewards and the geometric level curve.
//!
//! Advancing from level `L` to `L + 1` costs `floor(100 * 1.5^(L-1))` XP.
//! Values are computed as `100 * 3^k / 2^k` in integer arithmetic so the floor
//! is exact; levels whose cost no longer fits saturate at `u64::MAX`.

use serde::Serialize;

use super::types::Score;

pub const XP_PER_MINUTE: u32 = 2;
pub const HIGH_SCORE: u8 = 80;
pub const HIGH_SCORE_BONUS: u32 = 20;
pub const PASSING_SCORE: u8 = 60;
pub const PASSING_BONUS: u32 = 10;

const BASE_LEVEL_XP: u128 = 100;
/// Hard ceiling for the level search; unreachable with saturating thresholds.
const MAX_LEVEL: u32 = 500;

/// Bonus XP for the quiz result.
pub fn score_bonus(score: Score) -> u32 {
    match score.value() {
        s if s >= HIGH_SCORE => HIGH_SCORE_BONUS,
        s if s >= PASSING_SCORE => PASSING_BONUS,
        _ => 0,
    }
}

/// XP for one completion: 2 XP per estimated minute plus the score bonus.
pub fn lesson_xp(estimated_time_minutes: u32, score: Score) -> u32 {
    estimated_time_minutes
        .saturating_mul(XP_PER_MINUTE)
        .saturating_add(score_bonus(score))
}

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_to_advance(level: u32) -> u64 {
    let steps = level.saturating_sub(1);
    let Some(numerator) = 3u128
        .checked_pow(steps)
        .and_then(|p| p.checked_mul(BASE_LEVEL_XP))
    else {
        return u64::MAX;
    };
    u64::try_from(numerator >> steps).unwrap_or(u64::MAX)
}

/// Cumulative XP required to reach `level`. Level 1 requires nothing.
pub fn xp_threshold(level: u32) -> u64 {
    (1..level).fold(0u64, |total, l| total.saturating_add(xp_to_advance(l)))
}

/// Largest level whose cumulative threshold is covered by `total_xp`.
pub fn level_for_xp(total_xp: u64) -> u32 {
    let mut level = 1;
    let mut threshold = 0u64;

    while level < MAX_LEVEL {
        let cost = xp_to_advance(level);
        if cost == u64::MAX {
            break;
        }
        let next = threshold.saturating_add(cost);
        if next > total_xp {
            break;
        }
        threshold = next;
        level += 1;
    }

    level
}

/// Where a user stands inside their current level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub total_xp: u64,
    /// Cumulative XP at which the current level started.
    pub level_start_xp: u64,
    /// Cumulative XP at which the next level starts.
    pub next_level_xp: u64,
    pub xp_into_level: u64,
    pub xp_to_next_level: u64,
    /// Fraction of the current level completed (0.0 - 1.0).
    pub progress: f64,
}

impl LevelProgress {
    pub fn from_total_xp(total_xp: u64) -> Self {
        let level = level_for_xp(total_xp);
        let level_start_xp = xp_threshold(level);
        let next_level_xp = level_start_xp.saturating_add(xp_to_advance(level));
        let xp_into_level = total_xp.saturating_sub(level_start_xp);
        let span = next_level_xp.saturating_sub(level_start_xp);
        let progress = if span == 0 {
            1.0
        } else {
            (xp_into_level as f64 / span as f64).min(1.0)
        };

        Self {
            level,
            total_xp,
            level_start_xp,
            next_level_xp,
            xp_into_level,
            xp_to_next_level: next_level_xp.saturating_sub(total_xp),
            progress,
        }
    }
}
