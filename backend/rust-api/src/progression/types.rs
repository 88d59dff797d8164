use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proficiency tier a user is placed into by the assessment.
///
/// Variant order matters: visibility gating relies on `Beginner < Intermediate < Advanced`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Lessons are tagged with the same three tiers users are placed into.
pub type Difficulty = SkillLevel;

impl SkillLevel {
    pub const ALL: [SkillLevel; 3] = [
        SkillLevel::Beginner,
        SkillLevel::Intermediate,
        SkillLevel::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown skill level: {0}")]
pub struct UnknownSkillLevel(pub String);

impl FromStr for SkillLevel {
    type Err = UnknownSkillLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(SkillLevel::Beginner),
            "intermediate" => Ok(SkillLevel::Intermediate),
            "advanced" => Ok(SkillLevel::Advanced),
            _ => Err(UnknownSkillLevel(s.to_string())),
        }
    }
}

/// Quiz score in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("score must be between 0 and 100, got {0}")]
pub struct InvalidScore(pub i64);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Result<Self, InvalidScore> {
        Self::try_from(i64::from(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// `round(part / whole * 100)`, clamped to the valid range. An empty whole scores 0.
    pub fn from_ratio(part: usize, whole: usize) -> Self {
        if whole == 0 {
            return Score(0);
        }
        let percent = (part.min(whole) as f64 / whole as f64 * 100.0).round();
        Score(percent as u8)
    }
}

impl TryFrom<i64> for Score {
    type Error = InvalidScore;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(InvalidScore(value))
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Minutes per day a learner commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DailyCommitment(u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time commitment: {0} minutes (allowed: 5, 10, 15, 20, 30)")]
pub struct InvalidCommitment(pub u32);

impl DailyCommitment {
    pub const ALLOWED_MINUTES: [u32; 5] = [5, 10, 15, 20, 30];
    const GOAL_XP_PER_MINUTE: u32 = 10;

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn daily_goal_xp(self) -> u32 {
        self.0 * Self::GOAL_XP_PER_MINUTE
    }
}

impl Default for DailyCommitment {
    fn default() -> Self {
        DailyCommitment(10)
    }
}

impl TryFrom<u32> for DailyCommitment {
    type Error = InvalidCommitment;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        if Self::ALLOWED_MINUTES.contains(&minutes) {
            Ok(DailyCommitment(minutes))
        } else {
            Err(InvalidCommitment(minutes))
        }
    }
}

impl From<DailyCommitment> for u32 {
    fn from(commitment: DailyCommitment) -> Self {
        commitment.0
    }
}

/// Life counter, bounded to `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Hearts(u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hearts must be between 0 and 5, got {0}")]
pub struct InvalidHearts(pub u8);

impl Hearts {
    pub const MAX: u8 = 5;

    pub fn count(self) -> u8 {
        self.0
    }
}

impl Default for Hearts {
    fn default() -> Self {
        Hearts(Self::MAX)
    }
}

impl TryFrom<u8> for Hearts {
    type Error = InvalidHearts;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Hearts(value))
        } else {
            Err(InvalidHearts(value))
        }
    }
}

impl From<Hearts> for u8 {
    fn from(hearts: Hearts) -> Self {
        hearts.0
    }
}

/// Progression state owned by a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgression {
    pub user_id: String,
    pub skill_level: SkillLevel,
    pub total_xp: u64,
    pub current_level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub hearts: Hearts,
    pub daily_time_commitment: DailyCommitment,
}

impl UserProgression {
    /// Fresh state for a newly registered account.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            skill_level: SkillLevel::default(),
            total_xp: 0,
            current_level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            hearts: Hearts::default(),
            daily_time_commitment: DailyCommitment::default(),
        }
    }
}

/// The parts of a catalog lesson the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonMetadata {
    pub estimated_time_minutes: u32,
    pub difficulty: Difficulty,
}

/// Per (user, lesson) completion state. Stored under `"{user_id}:{lesson_id}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonCompletionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    pub completed: bool,
    /// Latest submitted score.
    pub score: Score,
    pub best_score: Score,
    pub attempts: u32,
    /// Highest XP ever earned for this lesson.
    pub xp_earned: u32,
    /// Stored as epoch millis so listings sort by time in every backend.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
}

impl LessonCompletionRecord {
    pub fn key(user_id: &str, lesson_id: &str) -> String {
        format!("{}:{}", user_id, lesson_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_levels_are_ordered_by_tier() {
        assert!(SkillLevel::Beginner < SkillLevel::Intermediate);
        assert!(SkillLevel::Intermediate < SkillLevel::Advanced);
    }

    #[test]
    fn skill_level_parses_case_insensitively() {
        assert_eq!("advanced".parse::<SkillLevel>(), Ok(SkillLevel::Advanced));
        assert_eq!(
            " Intermediate ".parse::<SkillLevel>(),
            Ok(SkillLevel::Intermediate)
        );
        assert!("expert".parse::<SkillLevel>().is_err());
    }

    #[test]
    fn score_rejects_out_of_range_values() {
        assert!(Score::try_from(-1).is_err());
        assert!(Score::try_from(101).is_err());
        assert_eq!(Score::try_from(100).map(Score::value), Ok(100));
    }

    #[test]
    fn score_deserializes_through_range_check() {
        let ok: Score = serde_json::from_str("85").unwrap();
        assert_eq!(ok.value(), 85);
        assert!(serde_json::from_str::<Score>("150").is_err());
    }

    #[test]
    fn score_from_ratio_rounds_half_up() {
        assert_eq!(Score::from_ratio(2, 3).value(), 67);
        assert_eq!(Score::from_ratio(1, 8).value(), 13);
        assert_eq!(Score::from_ratio(5, 5).value(), 100);
        assert_eq!(Score::from_ratio(0, 0).value(), 0);
    }

    #[test]
    fn commitment_accepts_only_enumerated_minutes() {
        for minutes in DailyCommitment::ALLOWED_MINUTES {
            assert!(DailyCommitment::try_from(minutes).is_ok());
        }
        assert_eq!(
            DailyCommitment::try_from(7),
            Err(InvalidCommitment(7))
        );
        assert_eq!(DailyCommitment::default().daily_goal_xp(), 100);
    }

    #[test]
    fn hearts_are_bounded() {
        assert_eq!(Hearts::default().count(), 5);
        assert!(Hearts::try_from(6).is_err());
        assert!(Hearts::try_from(0).is_ok());
    }

    #[test]
    fn new_progression_starts_at_level_one() {
        let progression = UserProgression::new("u1");
        assert_eq!(progression.current_level, 1);
        assert_eq!(progression.total_xp, 0);
        assert_eq!(progression.last_active_date, None);
        assert_eq!(progression.skill_level, SkillLevel::Beginner);
    }
}
