//! Progression rules: XP and levels, daily streaks, skill-gated lesson
//! visibility, assessment scoring and badge eligibility.
//!
//! Everything here is synchronous and free of I/O. Services load state from the
//! store, run these functions and persist the result.

pub mod assessment;
pub mod badges;
pub mod completion;
pub mod leveling;
pub mod streak;
pub mod types;
pub mod visibility;

pub use assessment::{compute_assessment_result, AssessmentError, AssessmentResult};
pub use badges::{evaluate_badges, BadgeCondition, BadgeDefinition, ProgressSnapshot};
pub use completion::{compute_lesson_completion, LessonCompletionOutcome};
pub use leveling::{lesson_xp, level_for_xp, xp_threshold, LevelProgress};
pub use streak::{next_streak, register_activity};
pub use types::{
    DailyCommitment, Difficulty, Hearts, InvalidCommitment, InvalidScore, LessonCompletionRecord,
    LessonMetadata, Score, SkillLevel, UnknownSkillLevel, UserProgression,
};
pub use visibility::{is_visible, visible_difficulties};
