use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::user::bson_datetime_as_chrono;
use crate::progression::{AssessmentResult, SkillLevel};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssessmentOption {
    pub text: &'static str,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssessmentQuestion {
    pub id: u8,
    pub question: &'static str,
    pub options: [AssessmentOption; 4],
}

const fn options(texts: [&'static str; 4]) -> [AssessmentOption; 4] {
    [
        AssessmentOption { text: texts[0], score: 0 },
        AssessmentOption { text: texts[1], score: 2 },
        AssessmentOption { text: texts[2], score: 4 },
        AssessmentOption { text: texts[3], score: 6 },
    ]
}

/// The placement battery. Option scores are 0, 2, 4 and 6 in listed order.
pub const ASSESSMENT_QUESTIONS: [AssessmentQuestion; 12] = [
    AssessmentQuestion {
        id: 1,
        question: "How comfortable are you with using a smartphone?",
        options: options([
            "I rarely use a smartphone",
            "I can make calls and send texts",
            "I use apps and browse the internet",
            "I use many apps and features regularly",
        ]),
    },
    AssessmentQuestion {
        id: 2,
        question: "How often do you use email?",
        options: options([
            "Never or rarely",
            "A few times a month",
            "A few times a week",
            "Daily",
        ]),
    },
    AssessmentQuestion {
        id: 3,
        question: "Have you ever made a video call (Zoom, FaceTime, etc.)?",
        options: options([
            "No, never",
            "Yes, but I need help",
            "Yes, I can do it with some guidance",
            "Yes, I do it regularly and easily",
        ]),
    },
    AssessmentQuestion {
        id: 4,
        question: "How comfortable are you with installing apps on your phone?",
        options: options([
            "I have never installed an app",
            "I have tried but need help",
            "I can do it with instructions",
            "I install apps regularly",
        ]),
    },
    AssessmentQuestion {
        id: 5,
        question: "Have you used online banking or paid bills online?",
        options: options([
            "No, never",
            "Yes, but I find it difficult",
            "Yes, I can do it with some help",
            "Yes, I do it regularly",
        ]),
    },
    AssessmentQuestion {
        id: 6,
        question: "How familiar are you with social media (Facebook, Instagram, etc.)?",
        options: options([
            "I do not use social media",
            "I have an account but rarely use it",
            "I use it occasionally",
            "I use it regularly",
        ]),
    },
    AssessmentQuestion {
        id: 7,
        question: "Have you ever shopped online (Amazon, grocery delivery, etc.)?",
        options: options([
            "No, never",
            "Yes, but I need assistance",
            "Yes, I can do it with guidance",
            "Yes, I shop online regularly",
        ]),
    },
    AssessmentQuestion {
        id: 8,
        question: "How do you feel about creating and remembering passwords?",
        options: options([
            "I find it very difficult",
            "I struggle with it",
            "I can manage with help",
            "I handle passwords well",
        ]),
    },
    AssessmentQuestion {
        id: 9,
        question: "Have you used streaming services (Netflix, YouTube, etc.)?",
        options: options([
            "No, never",
            "Yes, but I need help navigating",
            "Yes, I can use them with some guidance",
            "Yes, I use them regularly",
        ]),
    },
    AssessmentQuestion {
        id: 10,
        question: "How comfortable are you with using a computer or tablet?",
        options: options([
            "Not comfortable at all",
            "Somewhat comfortable with basics",
            "Comfortable with common tasks",
            "Very comfortable",
        ]),
    },
    AssessmentQuestion {
        id: 11,
        question: "Have you ever used a calendar app or set reminders on your device?",
        options: options([
            "No, never",
            "I have tried but need help",
            "Yes, I can do it with instructions",
            "Yes, I use them regularly",
        ]),
    },
    AssessmentQuestion {
        id: 12,
        question: "How would you rate your overall confidence with technology?",
        options: options([
            "Very low - I avoid technology when possible",
            "Low - I only use what I absolutely must",
            "Moderate - I use technology but often need help",
            "High - I enjoy learning new technology",
        ]),
    },
];

/// Answers keyed by question id, valued by the chosen option's score.
#[derive(Debug, Deserialize)]
pub struct SubmitAssessmentRequest {
    pub answers: BTreeMap<u8, u8>,
}

/// Latest assessment per user, stored in "assessments" under the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    #[serde(rename = "_id")]
    pub user_id: String,
    /// Question id (as string, BSON keys must be strings) to option score.
    pub answers: BTreeMap<String, u8>,
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub skill_level: SkillLevel,
    #[serde(rename = "completedAt", with = "bson_datetime_as_chrono")]
    pub completed_at: DateTime<Utc>,
}

impl AssessmentRecord {
    pub fn new(
        user_id: &str,
        answers: &BTreeMap<u8, u8>,
        result: &AssessmentResult,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            answers: answers
                .iter()
                .map(|(id, score)| (id.to_string(), *score))
                .collect(),
            total_score: result.total_score,
            max_score: result.max_score,
            percentage: result.percentage,
            skill_level: result.skill_level,
            completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssessmentResponse {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub skill_level: SkillLevel,
    pub completed_at: DateTime<Utc>,
}

impl From<AssessmentRecord> for AssessmentResponse {
    fn from(record: AssessmentRecord) -> Self {
        Self {
            total_score: record.total_score,
            max_score: record.max_score,
            percentage: record.percentage,
            skill_level: record.skill_level,
            completed_at: record.completed_at,
        }
    }
}
