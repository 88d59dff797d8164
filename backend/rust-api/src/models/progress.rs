use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::badge::{BadgeSummary, EarnedBadge};
use crate::progression::{LevelProgress, Score, SkillLevel};

/// Body of `POST /lessons/{id}/complete`. Either a precomputed score or the
/// quiz answers to be graded.
#[derive(Debug, Deserialize)]
pub struct CompleteLessonRequest {
    pub score: Option<Score>,
    pub answers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CompleteLessonResponse {
    pub lesson_id: String,
    pub score: u8,
    pub best_score: u8,
    pub attempts: u32,
    pub xp_earned: u32,
    pub xp_credited: u32,
    pub total_xp: u64,
    pub leveled_up: bool,
    pub new_level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub new_badges: Vec<BadgeSummary>,
}

#[derive(Debug, Serialize)]
pub struct RecentLesson {
    pub lesson_id: String,
    pub title: String,
    pub score: u8,
    pub best_score: u8,
    pub xp_earned: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub skill_level: SkillLevel,
    pub total_xp: u64,
    pub level: LevelProgress,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub hearts: u8,
    pub daily_time_commitment: u32,
    pub daily_goal_xp: u32,
    pub total_lessons: u64,
    pub completed_lessons: usize,
    pub badges: Vec<EarnedBadge>,
    pub recent_lessons: Vec<RecentLesson>,
}
