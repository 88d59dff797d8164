//! Persistence seams.
//!
//! `LearningStore` owns every document the service reads or writes;
//! `CompletionLocks` provides the short-lived per-(user, lesson) mutual
//! exclusion used around lesson completion. Each has a MongoDB/Redis
//! implementation and an in-memory one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::{
    assessment::AssessmentRecord,
    badge::BadgeAward,
    catalog::{Category, Lesson},
    password_reset::PasswordReset,
    user::User,
};
use crate::progression::{BadgeDefinition, Difficulty, LessonCompletionRecord, UserProgression};

pub mod memory;
pub mod mongo;
pub mod redis_lock;

pub use memory::{MemoryLocks, MemoryStore};
pub use mongo::MongoStore;
pub use redis_lock::RedisLocks;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic version check failed; reload and retry.
    #[error("concurrent update on {0}")]
    Conflict(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LearningStore: Send + Sync {
    /// Backend name reported by the health check.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    async fn ensure_indexes(&self) -> StoreResult<()> {
        Ok(())
    }

    // Users

    /// Fails with `Duplicate` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Writes `progression` only if the stored version still equals
    /// `expected_version`, then bumps the version. Returns the new version.
    async fn save_progression(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
    ) -> StoreResult<i64>;
    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()>;
    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    // Catalog

    async fn upsert_category(&self, category: &Category) -> StoreResult<()>;
    async fn upsert_lesson(&self, lesson: &Lesson) -> StoreResult<()>;
    async fn upsert_badge(&self, badge: &BadgeDefinition) -> StoreResult<()>;
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    /// Active lessons with one of `difficulties`, ordered by `order`.
    async fn list_lessons(&self, difficulties: &[Difficulty]) -> StoreResult<Vec<Lesson>>;
    async fn find_lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>>;
    async fn count_active_lessons(&self) -> StoreResult<u64>;
    async fn list_badges(&self) -> StoreResult<Vec<BadgeDefinition>>;

    // Completion records and awards

    async fn find_completion(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonCompletionRecord>>;
    /// Persists one lesson completion as a single unit: the progression write
    /// is guarded by `expected_version`, the record write by the attempts
    /// count of the record it replaces (`None` when there was none). Either
    /// both writes land or neither does; a failed guard is `Conflict`.
    /// Returns the new user version.
    async fn commit_completion(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
        previous_attempts: Option<u32>,
        record: &LessonCompletionRecord,
    ) -> StoreResult<i64>;
    /// All records for a user, most recently completed first.
    async fn list_completions(&self, user_id: &str) -> StoreResult<Vec<LessonCompletionRecord>>;
    /// Awards for a user, most recent first.
    async fn list_awards(&self, user_id: &str) -> StoreResult<Vec<BadgeAward>>;
    /// Returns `false` when the award already existed.
    async fn insert_award(&self, award: &BadgeAward) -> StoreResult<bool>;

    // Assessments

    async fn save_assessment(&self, record: &AssessmentRecord) -> StoreResult<()>;
    async fn find_assessment(&self, user_id: &str) -> StoreResult<Option<AssessmentRecord>>;

    // Password resets

    async fn save_password_reset(&self, reset: &PasswordReset) -> StoreResult<()>;
    /// Removes and returns the reset stored under `token_hash`.
    async fn take_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>>;
}

/// Proof of lock ownership, needed to release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub token: String,
}

#[async_trait]
pub trait CompletionLocks: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    /// `None` when someone else holds the lock.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<Option<LockToken>>;

    /// Releases only if `token` still owns the lock.
    async fn release(&self, token: &LockToken) -> StoreResult<()>;
}

pub fn completion_lock_key(user_id: &str, lesson_id: &str) -> String {
    format!("lock:completion:{}:{}", user_id, lesson_id)
}
