//! Skill assessment scoring.
//!
//! The battery has 12 questions, each answered with an option worth 0, 2, 4 or 6
//! points. The percentage of the 72-point maximum places the user into a tier.

use serde::Serialize;
use std::collections::BTreeMap;

use super::types::SkillLevel;

pub const QUESTION_COUNT: usize = 12;
pub const OPTION_SCORES: [u8; 4] = [0, 2, 4, 6];
pub const MAX_SCORE: u32 = QUESTION_COUNT as u32 * 6;

const ADVANCED_ABOVE: f64 = 70.0;
const INTERMEDIATE_ABOVE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    #[error("expected {expected} answers, got {actual}")]
    WrongAnswerCount { expected: usize, actual: usize },
    #[error("unknown question id {0}")]
    UnknownQuestion(u8),
    #[error("question {question_id} has invalid score {score}")]
    InvalidScore { question_id: u8, score: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssessmentResult {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub skill_level: SkillLevel,
}

/// Tier for an assessment percentage: `> 70` advanced, `> 30` intermediate.
pub fn classify(percentage: f64) -> SkillLevel {
    if percentage > ADVANCED_ABOVE {
        SkillLevel::Advanced
    } else if percentage > INTERMEDIATE_ABOVE {
        SkillLevel::Intermediate
    } else {
        SkillLevel::Beginner
    }
}

/// Scores a complete answer set keyed by question id (`1..=12`).
pub fn compute_assessment_result(
    answers: &BTreeMap<u8, u8>,
) -> Result<AssessmentResult, AssessmentError> {
    if answers.len() != QUESTION_COUNT {
        return Err(AssessmentError::WrongAnswerCount {
            expected: QUESTION_COUNT,
            actual: answers.len(),
        });
    }

    let mut total_score = 0u32;
    for (&question_id, &score) in answers {
        if question_id == 0 || usize::from(question_id) > QUESTION_COUNT {
            return Err(AssessmentError::UnknownQuestion(question_id));
        }
        if !OPTION_SCORES.contains(&score) {
            return Err(AssessmentError::InvalidScore { question_id, score });
        }
        total_score += u32::from(score);
    }

    let percentage = f64::from(total_score) / f64::from(MAX_SCORE) * 100.0;

    Ok(AssessmentResult {
        total_score,
        max_score: MAX_SCORE,
        percentage,
        skill_level: classify(percentage),
    })
}
