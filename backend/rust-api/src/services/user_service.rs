use crate::error::AppResult;
use crate::models::user::{UpdateSkillLevelRequest, UpdateTimeCommitmentRequest};
use crate::progression::{DailyCommitment, SkillLevel, UserProgression};
use crate::services::AppState;

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Manual override of the assessed skill level.
    pub async fn update_skill_level(
        &self,
        user_id: &str,
        req: UpdateSkillLevelRequest,
    ) -> AppResult<UserProgression> {
        let skill_level: SkillLevel = req.skill_level.parse()?;

        let progression = self
            .state
            .update_progression(user_id, "update_skill_level", |progression| {
                progression.skill_level = skill_level;
            })
            .await?;

        tracing::info!(user_id, skill_level = %skill_level, "Skill level updated");
        Ok(progression)
    }

    pub async fn update_time_commitment(
        &self,
        user_id: &str,
        req: UpdateTimeCommitmentRequest,
    ) -> AppResult<UserProgression> {
        let commitment = DailyCommitment::try_from(req.minutes)?;

        let progression = self
            .state
            .update_progression(user_id, "update_time_commitment", |progression| {
                progression.daily_time_commitment = commitment;
            })
            .await?;

        tracing::info!(user_id, minutes = commitment.minutes(), "Time commitment updated");
        Ok(progression)
    }
}
