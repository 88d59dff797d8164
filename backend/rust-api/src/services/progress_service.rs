use std::collections::HashMap;

use crate::error::AppResult;
use crate::models::badge::{BadgeSummary, EarnedBadge};
use crate::models::progress::{ProgressResponse, RecentLesson};
use crate::progression::LevelProgress;
use crate::services::AppState;

const RECENT_LESSON_LIMIT: usize = 10;

pub struct ProgressService<'a> {
    state: &'a AppState,
}

impl<'a> ProgressService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn progress(&self, user_id: &str) -> AppResult<ProgressResponse> {
        let store = &self.state.store;
        let progression = self.state.load_user(user_id).await?.progression;

        let completions = store.list_completions(user_id).await?;
        let total_lessons = store.count_active_lessons().await?;

        let definitions: HashMap<String, BadgeSummary> = store
            .list_badges()
            .await?
            .iter()
            .map(|badge| (badge.id.clone(), BadgeSummary::from(badge)))
            .collect();
        let badges = store
            .list_awards(user_id)
            .await?
            .into_iter()
            .filter_map(|award| {
                let badge = definitions.get(&award.badge_id)?.clone();
                Some(EarnedBadge {
                    badge,
                    earned_at: award.earned_at,
                })
            })
            .collect();

        let mut recent_lessons = Vec::with_capacity(RECENT_LESSON_LIMIT);
        for record in completions.iter().take(RECENT_LESSON_LIMIT) {
            // Lessons removed from the catalog keep their record but lose the title.
            let title = store
                .find_lesson(&record.lesson_id)
                .await?
                .map(|lesson| lesson.title)
                .unwrap_or_default();
            recent_lessons.push(RecentLesson {
                lesson_id: record.lesson_id.clone(),
                title,
                score: record.score.value(),
                best_score: record.best_score.value(),
                xp_earned: record.xp_earned,
                completed_at: record.completed_at,
            });
        }

        Ok(ProgressResponse {
            skill_level: progression.skill_level,
            total_xp: progression.total_xp,
            level: LevelProgress::from_total_xp(progression.total_xp),
            current_streak: progression.current_streak,
            longest_streak: progression.longest_streak,
            last_active_date: progression.last_active_date,
            hearts: progression.hearts.count(),
            daily_time_commitment: progression.daily_time_commitment.minutes(),
            daily_goal_xp: progression.daily_time_commitment.daily_goal_xp(),
            total_lessons,
            completed_lessons: completions.iter().filter(|r| r.completed).count(),
            badges,
            recent_lessons,
        })
    }
}
