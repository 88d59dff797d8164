use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::{create_test_app, register, send, unique_email};

#[tokio::test]
async fn test_register_returns_token_and_fresh_progression() {
    let app = create_test_app().await;
    let email = unique_email();

    let (status, body) = register(&app, &email, "password123").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().unwrap().len() > 20);
    assert_eq!(body["user"]["email"], email.as_str());
    assert_eq!(body["user"]["progression"]["skill_level"], "Beginner");
    assert_eq!(body["user"]["progression"]["current_level"], 1);
    assert_eq!(body["user"]["progression"]["total_xp"], 0);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = create_test_app().await;
    let email = unique_email();

    let (status, _) = register(&app, &email, "password123").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, &email.to_uppercase(), "password123").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_register_rejects_short_password_and_bad_email() {
    let app = create_test_app().await;

    let (status, body) = register(&app, &unique_email(), "123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = register(&app, "not-an-email", "password123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_a_json_400() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": 42 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse JSON request body"));
}

#[tokio::test]
async fn test_login_and_me() {
    let app = create_test_app().await;
    let email = unique_email();
    register(&app, &email, "password123").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();
    assert!(body["user"]["last_login_at"].is_string());

    let (status, me) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["progression"]["daily_time_commitment"], 10);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = create_test_app().await;
    let email = unique_email();
    register(&app, &email, "password123").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": unique_email(), "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = create_test_app().await;

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/api/v1/progress", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = create_test_app().await;
    let email = unique_email();
    register(&app, &email, "password123").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["reset_token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "token": reset_token, "new_password": "new-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single-use.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/reset-password",
        None,
        Some(json!({ "token": reset_token, "new_password": "another-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "new-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_unknown_accounts() {
    let app = create_test_app().await;
    let email = unique_email();
    register(&app, &email, "password123").await;

    let (known_status, known) = send(
        &app,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(json!({ "email": email })),
    )
    .await;
    let (unknown_status, unknown) = send(
        &app,
        "POST",
        "/api/v1/auth/forgot-password",
        None,
        Some(json!({ "email": unique_email() })),
    )
    .await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known["message"], unknown["message"]);
    assert!(unknown.get("reset_token").is_none());
}
