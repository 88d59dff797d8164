use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middlewares::auth::JwtClaims,
    services::{progress_service::ProgressService, AppState},
};

/// GET /api/v1/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let progress = ProgressService::new(&state).progress(&claims.sub).await?;
    Ok(Json(progress))
}
