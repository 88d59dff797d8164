use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::{complete, create_test_app, register_learner, send};

#[tokio::test]
async fn test_new_learner_progress_is_empty() {
    let app = create_test_app().await;
    let token = register_learner(&app).await;

    let (status, body) = send(&app, "GET", "/api/v1/progress", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_xp"], 0);
    assert_eq!(body["level"]["level"], 1);
    assert_eq!(body["level"]["next_level_xp"], 100);
    assert_eq!(body["current_streak"], 0);
    assert!(body["last_active_date"].is_null());
    assert_eq!(body["hearts"], 5);
    assert_eq!(body["daily_time_commitment"], 10);
    assert_eq!(body["daily_goal_xp"], 100);
    assert_eq!(body["total_lessons"], 14);
    assert_eq!(body["completed_lessons"], 0);
    assert!(body["badges"].as_array().unwrap().is_empty());
    assert!(body["recent_lessons"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_reflects_completions_and_badges() {
    let app = create_test_app().await;
    let token = register_learner(&app).await;

    complete(&app, &token, "comm-email-basics", json!({ "score": 85 })).await;
    complete(&app, &token, "ent-streaming-basics", json!({ "score": 60 })).await;

    let (_, body) = send(&app, "GET", "/api/v1/progress", Some(&token), None).await;

    // 40 + (12 * 2 + 10)
    assert_eq!(body["total_xp"], 74);
    assert_eq!(body["level"]["xp_into_level"], 74);
    assert_eq!(body["level"]["xp_to_next_level"], 26);
    assert_eq!(body["completed_lessons"], 2);
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["longest_streak"], 1);
    assert!(body["last_active_date"].is_string());

    let badges = body["badges"].as_array().unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0]["id"], "badge-first-lesson");
    assert!(badges[0]["earned_at"].is_string());

    let recent = body["recent_lessons"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["lesson_id"], "ent-streaming-basics");
    assert_eq!(recent[0]["title"], "Streaming Movies and Shows");
    assert_eq!(recent[1]["lesson_id"], "comm-email-basics");
}

#[tokio::test]
async fn test_time_commitment_updates_daily_goal() {
    let app = create_test_app().await;
    let token = register_learner(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/user/time-commitment",
        Some(&token),
        Some(json!({ "minutes": 15 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily_time_commitment"], 15);

    let (_, progress) = send(&app, "GET", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(progress["daily_goal_xp"], 150);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/user/time-commitment",
        Some(&token),
        Some(json!({ "minutes": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_unknown_skill_level_is_rejected() {
    let app = create_test_app().await;
    let token = register_learner(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/user/skill-level",
        Some(&token),
        Some(json!({ "skill_level": "Expert" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/user/skill-level",
        Some(&token),
        Some(json!({ "skill_level": "intermediate" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skill_level"], "Intermediate");
}
