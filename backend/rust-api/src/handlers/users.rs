use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{UpdateSkillLevelRequest, UpdateTimeCommitmentRequest},
    services::{user_service::UserService, AppState},
};

/// POST /api/v1/user/skill-level
pub async fn update_skill_level(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateSkillLevelRequest>,
) -> AppResult<impl IntoResponse> {
    let progression = UserService::new(&state)
        .update_skill_level(&claims.sub, req)
        .await?;
    Ok(Json(progression))
}

/// POST /api/v1/user/time-commitment
pub async fn update_time_commitment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateTimeCommitmentRequest>,
) -> AppResult<impl IntoResponse> {
    let progression = UserService::new(&state)
        .update_time_commitment(&claims.sub, req)
        .await?;
    Ok(Json(progression))
}
