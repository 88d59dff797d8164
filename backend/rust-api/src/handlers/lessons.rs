use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::progress::CompleteLessonRequest,
    services::{completion_service::CompletionService, lesson_service::LessonService, AppState},
};

/// GET /api/v1/lessons - Catalog filtered to the caller's skill level
pub async fn list_lessons(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let catalog = LessonService::new(&state).list_catalog(&claims.sub).await?;
    Ok(Json(catalog))
}

/// GET /api/v1/lessons/{id}
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let lesson = LessonService::new(&state)
        .get_lesson(&claims.sub, &lesson_id)
        .await?;
    Ok(Json(lesson))
}

/// POST /api/v1/lessons/{id}/complete
pub async fn complete_lesson(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
    AppJson(req): AppJson<CompleteLessonRequest>,
) -> AppResult<impl IntoResponse> {
    let response = CompletionService::new(&state)
        .complete_lesson(&claims.sub, &lesson_id, req)
        .await?;
    Ok(Json(response))
}
