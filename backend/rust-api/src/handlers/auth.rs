use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppResult,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::user::{
        ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    },
    services::{auth_service::AuthService, AppState},
};

/// POST /api/v1/auth/register - Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    tracing::info!("Registering new user");

    let response = AuthService::new(&state).register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login - Login with email and password
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let response = AuthService::new(&state).login(req).await?;
    Ok(Json(response))
}

/// GET /api/v1/auth/me - Current user's profile and progression
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> AppResult<impl IntoResponse> {
    let profile = AuthService::new(&state).me(&claims.sub).await?;
    Ok(Json(profile))
}

/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    let response = AuthService::new(&state).forgot_password(req).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;

    AuthService::new(&state).reset_password(req).await?;
    Ok(Json(json!({ "message": "Password has been reset successfully" })))
}
