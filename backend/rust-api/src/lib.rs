use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod progression;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest("/api/v1", learner_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

/// Everything a signed-in learner does; all routes require a JWT.
fn learner_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/lessons", get(handlers::lessons::list_lessons))
        .route("/lessons/{id}", get(handlers::lessons::get_lesson))
        .route(
            "/lessons/{id}/complete",
            post(handlers::lessons::complete_lesson),
        )
        .route(
            "/assessment",
            get(handlers::assessment::get_assessment).post(handlers::assessment::submit_assessment),
        )
        .route(
            "/assessment/questions",
            get(handlers::assessment::get_questions),
        )
        .route("/progress", get(handlers::progress::get_progress))
        .route(
            "/user/skill-level",
            post(handlers::users::update_skill_level),
        )
        .route(
            "/user/time-commitment",
            post(handlers::users::update_time_commitment),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
