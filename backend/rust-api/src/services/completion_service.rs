use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::badge::{BadgeAward, BadgeSummary};
use crate::models::catalog::Lesson;
use crate::models::progress::{CompleteLessonRequest, CompleteLessonResponse};
use crate::progression::{
    compute_lesson_completion, evaluate_badges, LessonCompletionOutcome, ProgressSnapshot, Score,
};
use crate::repositories::{completion_lock_key, LockToken};
use crate::services::lesson_service::LessonService;
use crate::services::{is_version_conflict, AppState};
use crate::utils::retry::{retry_async_when, RetryConfig};

/// Upper bound on how long a crashed holder can block a (user, lesson) pair.
/// Not renewed: a holder stalled past it fails the version/attempts guard on
/// commit instead of overwriting a newer record.
const COMPLETION_LOCK_TTL: Duration = Duration::from_secs(10);

pub struct CompletionService<'a> {
    state: &'a AppState,
}

impl<'a> CompletionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn complete_lesson(
        &self,
        user_id: &str,
        lesson_id: &str,
        req: CompleteLessonRequest,
    ) -> AppResult<CompleteLessonResponse> {
        let user = self.state.load_user(user_id).await?;
        let lesson = LessonService::new(self.state)
            .accessible_lesson(lesson_id, user.progression.skill_level)
            .await?;
        let score = resolve_score(&lesson, req)?;

        let lock = self.acquire_lock(user_id, lesson_id).await?;
        let result = self.complete_locked(user_id, &lesson, score).await;
        if let Err(e) = self.state.locks.release(&lock).await {
            tracing::warn!(error = %e, key = %lock.key, "Failed to release completion lock");
        }
        let (outcome, new_badges) = result?;

        metrics::record_lesson_completion(score, outcome.xp_credited, outcome.leveled_up);
        tracing::info!(
            user_id,
            lesson_id,
            score = score.value(),
            xp_credited = outcome.xp_credited,
            total_xp = outcome.progression.total_xp,
            level = outcome.new_level,
            streak = outcome.new_streak,
            badges = new_badges.len(),
            "Lesson completed"
        );

        Ok(CompleteLessonResponse {
            lesson_id: lesson.id,
            score: outcome.record.score.value(),
            best_score: outcome.record.best_score.value(),
            attempts: outcome.record.attempts,
            xp_earned: outcome.xp_earned,
            xp_credited: outcome.xp_credited,
            total_xp: outcome.progression.total_xp,
            leveled_up: outcome.leveled_up,
            new_level: outcome.new_level,
            current_streak: outcome.progression.current_streak,
            longest_streak: outcome.progression.longest_streak,
            new_badges,
        })
    }

    async fn acquire_lock(&self, user_id: &str, lesson_id: &str) -> AppResult<LockToken> {
        let key = completion_lock_key(user_id, lesson_id);
        let key = key.as_str();

        let acquired = retry_async_when(
            RetryConfig::lock_acquisition(),
            |e: &AppError| matches!(e, AppError::Conflict(_)),
            || async move {
                self.state
                    .locks
                    .try_acquire(key, COMPLETION_LOCK_TTL)
                    .await?
                    .ok_or_else(|| {
                        AppError::Conflict(
                            "Lesson completion already in progress".to_string(),
                        )
                    })
            },
        )
        .await;

        metrics::record_lock_wait(acquired.is_ok());
        acquired
    }

    /// Commits the progression and the lesson record in one guarded write,
    /// retrying with fresh state on conflict, then grants newly earned badges.
    /// Caller holds the completion lock.
    async fn complete_locked(
        &self,
        user_id: &str,
        lesson: &Lesson,
        score: Score,
    ) -> AppResult<(LessonCompletionOutcome, Vec<BadgeSummary>)> {
        let store = &self.state.store;
        let today = self.state.today();
        let metadata = lesson.metadata();

        let outcome = retry_async_when(RetryConfig::default(), is_version_conflict, || async move {
            let user = self.state.load_user(user_id).await?;
            let previous = store.find_completion(user_id, &lesson.id).await?;
            let outcome = compute_lesson_completion(
                &user.progression,
                previous.as_ref(),
                &lesson.id,
                &metadata,
                score,
                today,
                Utc::now(),
            );

            store
                .commit_completion(
                    user_id,
                    user.version,
                    &outcome.progression,
                    previous.as_ref().map(|record| record.attempts),
                    &outcome.record,
                )
                .await
                .map_err(|e| {
                    if e.is_conflict() {
                        metrics::record_persistence_conflict("complete_lesson");
                    }
                    AppError::from(e)
                })?;
            Ok::<_, AppError>(outcome)
        })
        .await?;

        // The completion is already committed; missed badges are picked up by
        // the next evaluation.
        let new_badges = match self.award_badges(user_id, &outcome).await {
            Ok(badges) => badges,
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Badge evaluation failed");
                Vec::new()
            }
        };
        Ok((outcome, new_badges))
    }

    async fn award_badges(
        &self,
        user_id: &str,
        outcome: &LessonCompletionOutcome,
    ) -> AppResult<Vec<BadgeSummary>> {
        let store = &self.state.store;
        let definitions = store.list_badges().await?;
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let completed_lessons: HashSet<String> = store
            .list_completions(user_id)
            .await?
            .into_iter()
            .filter(|record| record.completed)
            .map(|record| record.lesson_id)
            .collect();
        let already_awarded: HashSet<String> = store
            .list_awards(user_id)
            .await?
            .into_iter()
            .map(|award| award.badge_id)
            .collect();

        let snapshot = ProgressSnapshot {
            progression: &outcome.progression,
            completed_lessons: &completed_lessons,
        };
        let earned = evaluate_badges(&snapshot, &definitions, &already_awarded);

        let now = Utc::now();
        let mut awarded = Vec::with_capacity(earned.len());
        for badge_id in earned {
            if !store
                .insert_award(&BadgeAward::new(user_id, &badge_id, now))
                .await?
            {
                continue;
            }
            metrics::record_badge_awarded(&badge_id);
            tracing::info!(user_id, badge_id = %badge_id, "Badge awarded");
            if let Some(badge) = definitions.iter().find(|b| b.id == badge_id) {
                awarded.push(BadgeSummary::from(badge));
            }
        }
        Ok(awarded)
    }
}

/// Exactly one of `score` or `answers` must be supplied; answers are graded
/// against the lesson quiz.
fn resolve_score(lesson: &Lesson, req: CompleteLessonRequest) -> AppResult<Score> {
    match (req.score, req.answers) {
        (Some(score), None) => Ok(score),
        (None, Some(answers)) => Ok(lesson.grade_quiz(&answers)?),
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Provide either score or answers, not both".to_string(),
        )),
        (None, None) => Err(AppError::Validation(
            "Either score or answers is required".to_string(),
        )),
    }
}
