#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use techsteps_api::{
    config::Config,
    create_router,
    models::{
        assessment::AssessmentRecord,
        badge::BadgeAward,
        catalog::{Category, Lesson},
        password_reset::PasswordReset,
        user::User,
    },
    progression::{BadgeDefinition, Difficulty, LessonCompletionRecord, UserProgression},
    repositories::{LearningStore, MemoryLocks, MemoryStore, StoreError, StoreResult},
    services::{
        catalog_seed::{load_catalog, seed_catalog},
        AppState,
    },
};
use uuid::Uuid;

pub async fn create_test_state() -> Arc<AppState> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    Arc::new(
        AppState::connect(Config::in_memory())
            .await
            .expect("Failed to initialize test app state"),
    )
}

/// Router over a fresh in-memory store seeded with the bundled catalog.
pub async fn create_test_app() -> Router {
    create_router(create_test_state().await)
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

pub fn unique_email() -> String {
    format!("learner-{}@example.com", Uuid::new_v4())
}

pub async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": email, "password": password, "name": "Test Learner" })),
    )
    .await
}

/// Registers a fresh account and returns its access token.
pub async fn register_learner(app: &Router) -> String {
    let (status, body) = register(app, &unique_email(), "password123").await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

pub async fn complete(
    app: &Router,
    token: &str,
    lesson_id: &str,
    body: Value,
) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/v1/lessons/{}/complete", lesson_id),
        Some(token),
        Some(body),
    )
    .await
}

/// Answer set for the placement assessment: `high` questions answered with
/// the top option (6 points), the rest with the lowest (0 points).
pub fn assessment_answers(high: u8) -> Value {
    let answers: serde_json::Map<String, Value> = (1..=12u8)
        .map(|id| (id.to_string(), json!(if id <= high { 6 } else { 0 })))
        .collect();
    json!({ "answers": answers })
}

/// How an injected completion-commit failure behaves.
#[derive(Debug, Clone, Copy)]
pub enum CommitFailure {
    /// The commit is rejected before anything is written.
    BeforeWrite,
    /// The commit lands but the caller sees an error, as when the
    /// acknowledgement is lost.
    AfterWrite,
}

/// `MemoryStore` whose next `failures` completion commits fail.
pub struct FlakyStore {
    inner: MemoryStore,
    mode: CommitFailure,
    failures: AtomicU32,
}

impl FlakyStore {
    pub fn new(mode: CommitFailure, failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            mode,
            failures: AtomicU32::new(failures),
        }
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LearningStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky-memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn save_progression(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
    ) -> StoreResult<i64> {
        self.inner
            .save_progression(user_id, expected_version, progression)
            .await
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        self.inner.update_password(user_id, password_hash).await
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.record_login(user_id, at).await
    }

    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        self.inner.upsert_category(category).await
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        self.inner.upsert_lesson(lesson).await
    }

    async fn upsert_badge(&self, badge: &BadgeDefinition) -> StoreResult<()> {
        self.inner.upsert_badge(badge).await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn list_lessons(&self, difficulties: &[Difficulty]) -> StoreResult<Vec<Lesson>> {
        self.inner.list_lessons(difficulties).await
    }

    async fn find_lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>> {
        self.inner.find_lesson(lesson_id).await
    }

    async fn count_active_lessons(&self) -> StoreResult<u64> {
        self.inner.count_active_lessons().await
    }

    async fn list_badges(&self) -> StoreResult<Vec<BadgeDefinition>> {
        self.inner.list_badges().await
    }

    async fn find_completion(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonCompletionRecord>> {
        self.inner.find_completion(user_id, lesson_id).await
    }

    async fn commit_completion(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
        previous_attempts: Option<u32>,
        record: &LessonCompletionRecord,
    ) -> StoreResult<i64> {
        if !self.take_failure() {
            return self
                .inner
                .commit_completion(
                    user_id,
                    expected_version,
                    progression,
                    previous_attempts,
                    record,
                )
                .await;
        }
        if let CommitFailure::AfterWrite = self.mode {
            self.inner
                .commit_completion(
                    user_id,
                    expected_version,
                    progression,
                    previous_attempts,
                    record,
                )
                .await?;
        }
        Err(StoreError::Serialization("injected commit failure".to_string()))
    }

    async fn list_completions(&self, user_id: &str) -> StoreResult<Vec<LessonCompletionRecord>> {
        self.inner.list_completions(user_id).await
    }

    async fn list_awards(&self, user_id: &str) -> StoreResult<Vec<BadgeAward>> {
        self.inner.list_awards(user_id).await
    }

    async fn insert_award(&self, award: &BadgeAward) -> StoreResult<bool> {
        self.inner.insert_award(award).await
    }

    async fn save_assessment(&self, record: &AssessmentRecord) -> StoreResult<()> {
        self.inner.save_assessment(record).await
    }

    async fn find_assessment(&self, user_id: &str) -> StoreResult<Option<AssessmentRecord>> {
        self.inner.find_assessment(user_id).await
    }

    async fn save_password_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        self.inner.save_password_reset(reset).await
    }

    async fn take_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>> {
        self.inner.take_password_reset(token_hash).await
    }
}

/// In-memory state over `store`, seeded with the bundled catalog.
pub async fn create_state_with_store(store: Arc<dyn LearningStore>) -> Arc<AppState> {
    let state = AppState::new(Config::in_memory(), store, Arc::new(MemoryLocks::new()));
    let catalog = load_catalog(None).await.expect("bundled catalog loads");
    seed_catalog(state.store.as_ref(), &catalog)
        .await
        .expect("catalog seeds");
    Arc::new(state)
}
