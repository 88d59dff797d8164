use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::assessment::{
    AssessmentQuestion, AssessmentRecord, AssessmentResponse, SubmitAssessmentRequest,
    ASSESSMENT_QUESTIONS,
};
use crate::progression::compute_assessment_result;
use crate::services::AppState;

pub struct AssessmentService<'a> {
    state: &'a AppState,
}

impl<'a> AssessmentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn questions(&self) -> &'static [AssessmentQuestion] {
        &ASSESSMENT_QUESTIONS
    }

    /// Scores the answers, stores them as the user's latest assessment and
    /// places the user at the resulting skill level.
    pub async fn submit(
        &self,
        user_id: &str,
        req: SubmitAssessmentRequest,
    ) -> AppResult<AssessmentResponse> {
        let result = compute_assessment_result(&req.answers)?;
        // Fail with 404 before writing anything for a deleted account.
        self.state.load_user(user_id).await?;

        let record = AssessmentRecord::new(user_id, &req.answers, &result, Utc::now());
        self.state.store.save_assessment(&record).await?;

        let skill_level = result.skill_level;
        self.state
            .update_progression(user_id, "submit_assessment", |progression| {
                progression.skill_level = skill_level;
            })
            .await?;

        metrics::record_assessment(skill_level);
        tracing::info!(
            user_id,
            total_score = result.total_score,
            percentage = result.percentage,
            skill_level = %skill_level,
            "Assessment submitted"
        );

        Ok(AssessmentResponse::from(record))
    }

    pub async fn latest(&self, user_id: &str) -> AppResult<AssessmentResponse> {
        self.state
            .store
            .find_assessment(user_id)
            .await?
            .map(AssessmentResponse::from)
            .ok_or_else(|| AppError::not_found("Assessment", user_id))
    }
}
