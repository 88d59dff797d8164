use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{CompletionLocks, LearningStore, LockToken, StoreError, StoreResult};
use crate::models::{
    assessment::AssessmentRecord,
    badge::BadgeAward,
    catalog::{Category, Lesson},
    password_reset::PasswordReset,
    user::User,
};
use crate::progression::{BadgeDefinition, Difficulty, LessonCompletionRecord, UserProgression};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    categories: HashMap<String, Category>,
    lessons: HashMap<String, Lesson>,
    badges: HashMap<String, BadgeDefinition>,
    completions: HashMap<String, LessonCompletionRecord>,
    awards: HashMap<String, BadgeAward>,
    assessments: HashMap<String, AssessmentRecord>,
    password_resets: HashMap<String, PasswordReset>,
}

/// Process-local store used by tests and `storage_backend = "memory"`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        if db.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("user {}", user.email)));
        }
        if db.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        db.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let db = self.inner.read().await;
        Ok(db.users.values().find(|u| u.email == email).cloned())
    }

    async fn save_progression(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
    ) -> StoreResult<i64> {
        let mut db = self.inner.write().await;
        let user = db
            .users
            .get_mut(user_id)
            .filter(|u| u.version == expected_version)
            .ok_or_else(|| StoreError::Conflict(format!("users/{}", user_id)))?;

        user.progression = progression.clone();
        user.version += 1;
        user.updated_at = Utc::now();
        Ok(user.version)
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        if let Some(user) = db.users.get_mut(user_id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        if let Some(user) = db.users.get_mut(user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        db.categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        db.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(())
    }

    async fn upsert_badge(&self, badge: &BadgeDefinition) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        db.badges.insert(badge.id.clone(), badge.clone());
        Ok(())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let db = self.inner.read().await;
        let mut categories: Vec<Category> = db.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn list_lessons(&self, difficulties: &[Difficulty]) -> StoreResult<Vec<Lesson>> {
        let db = self.inner.read().await;
        let mut lessons: Vec<Lesson> = db
            .lessons
            .values()
            .filter(|l| l.is_active && difficulties.contains(&l.difficulty))
            .cloned()
            .collect();
        lessons.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(lessons)
    }

    async fn find_lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>> {
        Ok(self.inner.read().await.lessons.get(lesson_id).cloned())
    }

    async fn count_active_lessons(&self) -> StoreResult<u64> {
        let db = self.inner.read().await;
        Ok(db.lessons.values().filter(|l| l.is_active).count() as u64)
    }

    async fn list_badges(&self) -> StoreResult<Vec<BadgeDefinition>> {
        let db = self.inner.read().await;
        let mut badges: Vec<BadgeDefinition> = db.badges.values().cloned().collect();
        badges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(badges)
    }

    async fn find_completion(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonCompletionRecord>> {
        let key = LessonCompletionRecord::key(user_id, lesson_id);
        Ok(self.inner.read().await.completions.get(&key).cloned())
    }

    async fn commit_completion(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
        previous_attempts: Option<u32>,
        record: &LessonCompletionRecord,
    ) -> StoreResult<i64> {
        let mut db = self.inner.write().await;

        // Both guards are checked before anything is written.
        let stored_attempts = db.completions.get(&record.id).map(|r| r.attempts);
        if stored_attempts != previous_attempts {
            return Err(StoreError::Conflict(format!("lesson_progress/{}", record.id)));
        }
        let user = db
            .users
            .get_mut(user_id)
            .filter(|u| u.version == expected_version)
            .ok_or_else(|| StoreError::Conflict(format!("users/{}", user_id)))?;

        user.progression = progression.clone();
        user.version += 1;
        user.updated_at = Utc::now();
        let version = user.version;

        db.completions.insert(record.id.clone(), record.clone());
        Ok(version)
    }

    async fn list_completions(&self, user_id: &str) -> StoreResult<Vec<LessonCompletionRecord>> {
        let db = self.inner.read().await;
        let mut records: Vec<LessonCompletionRecord> = db
            .completions
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }

    async fn list_awards(&self, user_id: &str) -> StoreResult<Vec<BadgeAward>> {
        let db = self.inner.read().await;
        let mut awards: Vec<BadgeAward> = db
            .awards
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        awards.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(awards)
    }

    async fn insert_award(&self, award: &BadgeAward) -> StoreResult<bool> {
        let mut db = self.inner.write().await;
        if db.awards.contains_key(&award.id) {
            return Ok(false);
        }
        db.awards.insert(award.id.clone(), award.clone());
        Ok(true)
    }

    async fn save_assessment(&self, record: &AssessmentRecord) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        db.assessments.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn find_assessment(&self, user_id: &str) -> StoreResult<Option<AssessmentRecord>> {
        Ok(self.inner.read().await.assessments.get(user_id).cloned())
    }

    async fn save_password_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        let mut db = self.inner.write().await;
        db.password_resets
            .insert(reset.token_hash.clone(), reset.clone());
        Ok(())
    }

    async fn take_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>> {
        Ok(self.inner.write().await.password_resets.remove(token_hash))
    }
}

/// In-process lock table with per-entry expiry.
#[derive(Default)]
pub struct MemoryLocks {
    held: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryLocks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompletionLocks for MemoryLocks {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<Option<LockToken>> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = held.get(key) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let token = Uuid::new_v4().to_string();
        held.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(LockToken {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, token: &LockToken) -> StoreResult<()> {
        let mut held = self.held.lock().await;
        if held.get(&token.key).map(|(owner, _)| owner) == Some(&token.token) {
            held.remove(&token.key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::Score;

    fn user(id: &str, email: &str) -> User {
        User::new(
            id.to_string(),
            email.to_string(),
            "hash".to_string(),
            "Test".to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.insert_user(&user("u1", "a@example.com")).await.unwrap();

        let err = store
            .insert_user(&user("u2", "a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = MemoryStore::new();
        let u = user("u1", "a@example.com");
        store.insert_user(&u).await.unwrap();

        let mut progression = u.progression.clone();
        progression.total_xp = 40;
        assert_eq!(store.save_progression("u1", 0, &progression).await.unwrap(), 1);

        let err = store
            .save_progression("u1", 0, &progression)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.progression.total_xp, 40);
    }

    fn record(attempts: u32, xp_earned: u32) -> LessonCompletionRecord {
        LessonCompletionRecord {
            id: LessonCompletionRecord::key("u1", "l1"),
            user_id: "u1".to_string(),
            lesson_id: "l1".to_string(),
            completed: true,
            score: Score::new(85).unwrap(),
            best_score: Score::new(85).unwrap(),
            attempts,
            xp_earned,
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn completion_commit_writes_progression_and_record_together() {
        let store = MemoryStore::new();
        let u = user("u1", "a@example.com");
        store.insert_user(&u).await.unwrap();

        let mut progression = u.progression.clone();
        progression.total_xp = 40;
        let version = store
            .commit_completion("u1", 0, &progression, None, &record(1, 40))
            .await
            .unwrap();
        assert_eq!(version, 1);

        let stored = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.progression.total_xp, 40);
        let saved = store.find_completion("u1", "l1").await.unwrap().unwrap();
        assert_eq!(saved.xp_earned, 40);
    }

    #[tokio::test]
    async fn stale_version_leaves_record_untouched() {
        let store = MemoryStore::new();
        let u = user("u1", "a@example.com");
        store.insert_user(&u).await.unwrap();

        let mut progression = u.progression.clone();
        progression.total_xp = 40;
        let err = store
            .commit_completion("u1", 7, &progression, None, &record(1, 40))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        assert!(store.find_completion("u1", "l1").await.unwrap().is_none());
        let stored = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.progression.total_xp, 0);
    }

    #[tokio::test]
    async fn stale_attempts_leave_progression_untouched() {
        let store = MemoryStore::new();
        let u = user("u1", "a@example.com");
        store.insert_user(&u).await.unwrap();

        let mut progression = u.progression.clone();
        progression.total_xp = 40;
        store
            .commit_completion("u1", 0, &progression, None, &record(1, 40))
            .await
            .unwrap();

        // A writer that never saw the first record tries to create it again.
        progression.total_xp = 80;
        let err = store
            .commit_completion("u1", 1, &progression, None, &record(1, 40))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = store.find_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.progression.total_xp, 40);
        let saved = store.find_completion("u1", "l1").await.unwrap().unwrap();
        assert_eq!(saved.attempts, 1);
    }

    #[tokio::test]
    async fn awards_are_inserted_once() {
        let store = MemoryStore::new();
        let award = BadgeAward::new("u1", "first-steps", Utc::now());

        assert!(store.insert_award(&award).await.unwrap());
        assert!(!store.insert_award(&award).await.unwrap());
        assert_eq!(store.list_awards("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn password_reset_is_single_use() {
        let store = MemoryStore::new();
        let reset = PasswordReset {
            token_hash: "abc".to_string(),
            email: "a@example.com".to_string(),
            expires_at: Utc::now(),
        };
        store.save_password_reset(&reset).await.unwrap();

        assert!(store.take_password_reset("abc").await.unwrap().is_some());
        assert!(store.take_password_reset("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let locks = MemoryLocks::new();
        let ttl = Duration::from_secs(5);

        let token = locks.try_acquire("k", ttl).await.unwrap().unwrap();
        assert!(locks.try_acquire("k", ttl).await.unwrap().is_none());

        let stranger = LockToken {
            key: "k".to_string(),
            token: "not-mine".to_string(),
        };
        locks.release(&stranger).await.unwrap();
        assert!(locks.try_acquire("k", ttl).await.unwrap().is_none());

        locks.release(&token).await.unwrap();
        assert!(locks.try_acquire("k", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_lock_can_be_taken_over() {
        let locks = MemoryLocks::new();
        locks
            .try_acquire("k", Duration::from_millis(1))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(locks
            .try_acquire("k", Duration::from_secs(1))
            .await
            .unwrap()
            .is_some());
    }
}
