use chrono::{DateTime, NaiveDate, Utc};

use super::leveling::{lesson_xp, level_for_xp};
use super::streak::register_activity;
use super::types::{LessonCompletionRecord, LessonMetadata, Score, UserProgression};

/// Everything a lesson completion changes, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonCompletionOutcome {
    pub progression: UserProgression,
    pub record: LessonCompletionRecord,
    /// XP this submission is worth on its own.
    pub xp_earned: u32,
    /// Increase actually added to `total_xp` (0 when a better attempt already exists).
    pub xp_credited: u32,
    pub leveled_up: bool,
    pub new_level: u32,
    pub new_streak: u32,
}

/// Applies one quiz submission for `lesson_id` to the user's progression.
///
/// The stored per-lesson XP only ever moves up, so repeating a lesson credits at
/// most the difference to the best previous attempt.
pub fn compute_lesson_completion(
    current: &UserProgression,
    previous: Option<&LessonCompletionRecord>,
    lesson_id: &str,
    lesson: &LessonMetadata,
    score: Score,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> LessonCompletionOutcome {
    let xp_earned = lesson_xp(lesson.estimated_time_minutes, score);

    let record = match previous {
        Some(previous) => LessonCompletionRecord {
            completed: true,
            score,
            best_score: previous.best_score.max(score),
            attempts: previous.attempts.saturating_add(1),
            xp_earned: previous.xp_earned.max(xp_earned),
            completed_at: now,
            ..previous.clone()
        },
        None => LessonCompletionRecord {
            id: LessonCompletionRecord::key(&current.user_id, lesson_id),
            user_id: current.user_id.clone(),
            lesson_id: lesson_id.to_string(),
            completed: true,
            score,
            best_score: score,
            attempts: 1,
            xp_earned,
            completed_at: now,
        },
    };

    let xp_credited = record.xp_earned - previous.map_or(0, |p| p.xp_earned);

    let mut progression = current.clone();
    progression.total_xp = progression.total_xp.saturating_add(u64::from(xp_credited));
    let new_level = progression
        .current_level
        .max(level_for_xp(progression.total_xp));
    let leveled_up = new_level > current.current_level;
    progression.current_level = new_level;

    let streak = register_activity(
        progression.last_active_date,
        progression.current_streak,
        progression.longest_streak,
        today,
    );
    progression.current_streak = streak.current;
    progression.longest_streak = streak.longest;
    progression.last_active_date = Some(streak.last_active);

    LessonCompletionOutcome {
        progression,
        record,
        xp_earned,
        xp_credited,
        leveled_up,
        new_level,
        new_streak: streak.current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::types::Difficulty;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn lesson(minutes: u32) -> LessonMetadata {
        LessonMetadata {
            estimated_time_minutes: minutes,
            difficulty: Difficulty::Beginner,
        }
    }

    fn score(value: i64) -> Score {
        Score::try_from(value).unwrap()
    }

    #[test]
    fn first_completion_credits_full_xp_without_level_up() {
        let user = UserProgression::new("u1");
        let outcome =
            compute_lesson_completion(&user, None, "l1", &lesson(10), score(85), day(10), now());

        assert_eq!(outcome.xp_earned, 40);
        assert_eq!(outcome.xp_credited, 40);
        assert_eq!(outcome.progression.total_xp, 40);
        assert!(!outcome.leveled_up);
        assert_eq!(outcome.new_level, 1);
        assert_eq!(outcome.new_streak, 1);
        assert_eq!(outcome.record.id, "u1:l1");
        assert_eq!(outcome.record.attempts, 1);
        assert_eq!(outcome.progression.last_active_date, Some(day(10)));
    }

    #[test]
    fn crossing_threshold_levels_up() {
        let mut user = UserProgression::new("u1");
        user.total_xp = 80;
        let outcome =
            compute_lesson_completion(&user, None, "l1", &lesson(10), score(85), day(10), now());

        assert_eq!(outcome.progression.total_xp, 120);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.new_level, 2);
    }

    #[test]
    fn large_gain_can_skip_levels() {
        let mut user = UserProgression::new("u1");
        user.total_xp = 240;
        user.current_level = 2;
        let outcome =
            compute_lesson_completion(&user, None, "l1", &lesson(120), score(90), day(10), now());

        assert_eq!(outcome.progression.total_xp, 500);
        assert_eq!(outcome.new_level, 4);
        assert!(outcome.leveled_up);
    }

    #[test]
    fn repeat_with_lower_score_credits_nothing() {
        let user = UserProgression::new("u1");
        let first =
            compute_lesson_completion(&user, None, "l1", &lesson(10), score(90), day(10), now());
        let second = compute_lesson_completion(
            &first.progression,
            Some(&first.record),
            "l1",
            &lesson(10),
            score(40),
            day(10),
            now(),
        );

        assert_eq!(second.xp_earned, 20);
        assert_eq!(second.xp_credited, 0);
        assert_eq!(second.record.xp_earned, 40);
        assert_eq!(second.progression.total_xp, 40);
        assert_eq!(second.record.attempts, 2);
        assert_eq!(second.record.score.value(), 40);
        assert_eq!(second.record.best_score.value(), 90);
        assert_eq!(second.new_streak, 1);
    }

    #[test]
    fn repeat_with_higher_score_credits_only_the_difference() {
        let user = UserProgression::new("u1");
        let first =
            compute_lesson_completion(&user, None, "l1", &lesson(15), score(50), day(10), now());
        let second = compute_lesson_completion(
            &first.progression,
            Some(&first.record),
            "l1",
            &lesson(15),
            score(95),
            day(11),
            now(),
        );

        assert_eq!(first.record.xp_earned, 30);
        assert_eq!(second.xp_earned, 50);
        assert_eq!(second.xp_credited, 20);
        assert_eq!(second.progression.total_xp, 50);
        assert_eq!(second.new_streak, 2);
    }

    #[test]
    fn level_never_decreases_even_if_stored_level_is_ahead() {
        let mut user = UserProgression::new("u1");
        user.current_level = 3;
        user.total_xp = 10;
        let outcome =
            compute_lesson_completion(&user, None, "l1", &lesson(5), score(10), day(10), now());

        assert_eq!(outcome.new_level, 3);
        assert!(!outcome.leveled_up);
    }

    #[test]
    fn sequence_of_completions_is_monotone() {
        let mut user = UserProgression::new("u1");
        let mut record: Option<LessonCompletionRecord> = None;
        let scores = [90, 20, 100, 0, 65, 80];

        for (i, s) in scores.iter().enumerate() {
            let before = user.clone();
            let outcome = compute_lesson_completion(
                &user,
                record.as_ref(),
                "l1",
                &lesson(30),
                score(*s),
                day(1 + i as u32),
                now(),
            );
            assert!(outcome.progression.total_xp >= before.total_xp);
            assert!(outcome.progression.current_level >= before.current_level);
            assert!(outcome.progression.longest_streak >= before.longest_streak);
            if let Some(previous) = &record {
                assert!(outcome.record.xp_earned >= previous.xp_earned);
            }
            user = outcome.progression;
            record = Some(outcome.record);
        }

        assert_eq!(user.total_xp, 80);
        assert_eq!(user.current_streak, scores.len() as u32);
    }
}
