use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::assessment::SubmitAssessmentRequest,
    services::{assessment_service::AssessmentService, AppState},
};

/// GET /api/v1/assessment/questions
pub async fn get_questions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(AssessmentService::new(&state).questions())
}

/// POST /api/v1/assessment
pub async fn submit_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitAssessmentRequest>,
) -> AppResult<impl IntoResponse> {
    let response = AssessmentService::new(&state)
        .submit(&claims.sub, req)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/assessment - Latest assessment
pub async fn get_assessment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let response = AssessmentService::new(&state).latest(&claims.sub).await?;
    Ok(Json(response))
}
