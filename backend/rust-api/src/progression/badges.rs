//! Badge definitions and eligibility checks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::UserProgression;

/// Unlock rule attached to a badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeCondition {
    /// At least `count` distinct lessons completed.
    LessonsCompleted { count: u32 },
    TotalXp { at_least: u64 },
    /// Current daily streak of at least `days`.
    Streak { days: u32 },
    Level { at_least: u32 },
    /// Every listed lesson completed.
    LessonSet { lesson_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeDefinition {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub condition: BadgeCondition,
}

/// State a badge condition is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot<'a> {
    pub progression: &'a UserProgression,
    pub completed_lessons: &'a HashSet<String>,
}

impl BadgeCondition {
    pub fn is_satisfied(&self, snapshot: &ProgressSnapshot<'_>) -> bool {
        let progression = snapshot.progression;
        match self {
            BadgeCondition::LessonsCompleted { count } => {
                snapshot.completed_lessons.len() >= *count as usize
            }
            BadgeCondition::TotalXp { at_least } => progression.total_xp >= *at_least,
            BadgeCondition::Streak { days } => progression.current_streak >= *days,
            BadgeCondition::Level { at_least } => progression.current_level >= *at_least,
            BadgeCondition::LessonSet { lesson_ids } => {
                !lesson_ids.is_empty()
                    && lesson_ids
                        .iter()
                        .all(|id| snapshot.completed_lessons.contains(id))
            }
        }
    }
}

/// Ids of badges whose condition now holds and that the user does not have yet.
pub fn evaluate_badges(
    snapshot: &ProgressSnapshot<'_>,
    definitions: &[BadgeDefinition],
    already_awarded: &HashSet<String>,
) -> Vec<String> {
    let mut newly_earned = Vec::new();

    for badge in definitions {
        if already_awarded.contains(&badge.id) || newly_earned.contains(&badge.id) {
            continue;
        }
        if badge.condition.is_satisfied(snapshot) {
            newly_earned.push(badge.id.clone());
        }
    }

    newly_earned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(id: &str, condition: BadgeCondition) -> BadgeDefinition {
        BadgeDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            icon: String::new(),
            condition,
        }
    }

    fn catalog() -> Vec<BadgeDefinition> {
        vec![
            badge("first", BadgeCondition::LessonsCompleted { count: 1 }),
            badge("week", BadgeCondition::Streak { days: 7 }),
            badge("level-5", BadgeCondition::Level { at_least: 5 }),
            badge("xp-500", BadgeCondition::TotalXp { at_least: 500 }),
            badge(
                "email",
                BadgeCondition::LessonSet {
                    lesson_ids: vec!["email-1".to_string(), "email-2".to_string()],
                },
            ),
        ]
    }

    fn completed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_completion_unlocks_first_lesson_badge() {
        let progression = UserProgression::new("u1");
        let lessons = completed(&["email-1"]);
        let snapshot = ProgressSnapshot {
            progression: &progression,
            completed_lessons: &lessons,
        };

        let earned = evaluate_badges(&snapshot, &catalog(), &HashSet::new());
        assert_eq!(earned, vec!["first".to_string()]);
    }

    #[test]
    fn threshold_badges_unlock_on_reaching_threshold() {
        let mut progression = UserProgression::new("u1");
        progression.current_streak = 7;
        progression.current_level = 5;
        progression.total_xp = 500;
        let lessons = completed(&["email-1", "email-2"]);
        let snapshot = ProgressSnapshot {
            progression: &progression,
            completed_lessons: &lessons,
        };

        let earned = evaluate_badges(&snapshot, &catalog(), &HashSet::new());
        assert_eq!(earned, vec!["first", "week", "level-5", "xp-500", "email"]);
    }

    #[test]
    fn already_awarded_badges_are_never_returned_again() {
        let progression = UserProgression::new("u1");
        let lessons = completed(&["email-1"]);
        let snapshot = ProgressSnapshot {
            progression: &progression,
            completed_lessons: &lessons,
        };
        let awarded = completed(&["first"]);

        assert!(evaluate_badges(&snapshot, &catalog(), &awarded).is_empty());
        assert!(evaluate_badges(&snapshot, &catalog(), &awarded).is_empty());
    }

    #[test]
    fn duplicate_definitions_yield_one_award() {
        let progression = UserProgression::new("u1");
        let lessons = completed(&["a"]);
        let snapshot = ProgressSnapshot {
            progression: &progression,
            completed_lessons: &lessons,
        };
        let definitions = vec![
            badge("first", BadgeCondition::LessonsCompleted { count: 1 }),
            badge("first", BadgeCondition::LessonsCompleted { count: 1 }),
        ];

        assert_eq!(
            evaluate_badges(&snapshot, &definitions, &HashSet::new()),
            vec!["first"]
        );
    }

    #[test]
    fn empty_lesson_set_never_unlocks() {
        let progression = UserProgression::new("u1");
        let lessons = completed(&["a"]);
        let snapshot = ProgressSnapshot {
            progression: &progression,
            completed_lessons: &lessons,
        };
        assert!(!BadgeCondition::LessonSet { lesson_ids: vec![] }.is_satisfied(&snapshot));
    }

    #[test]
    fn condition_serializes_with_kind_tag() {
        let json = serde_json::to_value(BadgeCondition::Streak { days: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "streak", "days": 7 }));
    }
}
