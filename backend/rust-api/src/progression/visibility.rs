use std::collections::BTreeSet;

use super::types::{Difficulty, SkillLevel};

/// Lesson difficulties a user at `skill_level` may see: their own tier and everything below.
pub fn visible_difficulties(skill_level: SkillLevel) -> BTreeSet<Difficulty> {
    Difficulty::ALL
        .into_iter()
        .filter(|difficulty| *difficulty <= skill_level)
        .collect()
}

pub fn is_visible(skill_level: SkillLevel, difficulty: Difficulty) -> bool {
    difficulty <= skill_level
}
