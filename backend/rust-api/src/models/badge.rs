use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;
use crate::progression::BadgeDefinition;

/// Award stored in "user_badges" under `"{user_id}:{badge_id}"`, so a badge
/// can only ever be granted once per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeAward {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub badge_id: String,
    #[serde(rename = "earnedAt", with = "bson_datetime_as_chrono")]
    pub earned_at: DateTime<Utc>,
}

impl BadgeAward {
    pub fn new(user_id: &str, badge_id: &str, earned_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(user_id, badge_id),
            user_id: user_id.to_string(),
            badge_id: badge_id.to_string(),
            earned_at,
        }
    }

    pub fn key(user_id: &str, badge_id: &str) -> String {
        format!("{}:{}", user_id, badge_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BadgeSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl From<&BadgeDefinition> for BadgeSummary {
    fn from(badge: &BadgeDefinition) -> Self {
        Self {
            id: badge.id.clone(),
            name: badge.name.clone(),
            description: badge.description.clone(),
            icon: badge.icon.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EarnedBadge {
    #[serde(flatten)]
    pub badge: BadgeSummary,
    pub earned_at: DateTime<Utc>,
}
