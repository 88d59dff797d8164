use axum::{
    extract::{FromRequest, Request},
    Json,
};

use crate::error::AppError;

/// JSON extractor whose rejections render through `AppError`, so malformed
/// bodies get the same `{"message", "status"}` shape as every other error.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Failed to parse JSON request body: {}", rejection.body_text());
                tracing::warn!("{}", message);
                Err(AppError::Validation(message))
            }
        }
    }
}
