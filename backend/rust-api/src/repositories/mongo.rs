use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{
        ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
    },
    options::IndexOptions,
    Client, ClientSession, Collection, Database, IndexModel,
};

use super::{LearningStore, StoreError, StoreResult};
use crate::models::{
    assessment::AssessmentRecord,
    badge::BadgeAward,
    catalog::{Category, Lesson},
    password_reset::PasswordReset,
    user::User,
};
use crate::progression::{BadgeDefinition, Difficulty, LessonCompletionRecord, UserProgression};
use crate::utils::time::chrono_to_bson;

const USERS: &str = "users";
const CATEGORIES: &str = "categories";
const LESSONS: &str = "lessons";
const LESSON_PROGRESS: &str = "lesson_progress";
const BADGES: &str = "badges";
const USER_BADGES: &str = "user_badges";
const ASSESSMENTS: &str = "assessments";
const PASSWORD_RESETS: &str = "password_resets";

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self { client, db }
    }

    fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection::<T>(name)
    }

    /// Both completion writes inside `session`'s transaction.
    async fn write_completion(
        &self,
        session: &mut ClientSession,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
        previous_attempts: Option<u32>,
        record: &LessonCompletionRecord,
    ) -> StoreResult<i64> {
        let user_resource = format!("users/{}", user_id);
        let record_resource = format!("{}/{}", LESSON_PROGRESS, record.id);

        let updated = self
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": user_id, "version": expected_version },
                progression_update(progression)?,
            )
            .session(&mut *session)
            .await
            .map_err(|e| transaction_error(e, &user_resource))?;
        if updated.matched_count == 0 {
            return Err(StoreError::Conflict(user_resource));
        }

        let records = self.collection::<LessonCompletionRecord>(LESSON_PROGRESS);
        match previous_attempts {
            None => {
                records
                    .insert_one(record)
                    .session(&mut *session)
                    .await
                    .map_err(|e| {
                        if is_duplicate_key(&e) {
                            StoreError::Conflict(record_resource.clone())
                        } else {
                            transaction_error(e, &record_resource)
                        }
                    })?;
            }
            Some(attempts) => {
                let replaced = records
                    .replace_one(
                        doc! { "_id": &record.id, "attempts": i64::from(attempts) },
                        record,
                    )
                    .session(&mut *session)
                    .await
                    .map_err(|e| transaction_error(e, &record_resource))?;
                if replaced.matched_count == 0 {
                    return Err(StoreError::Conflict(record_resource));
                }
            }
        }

        Ok(expected_version + 1)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

fn to_bson<T: serde::Serialize>(value: &T) -> StoreResult<Bson> {
    bson::to_bson(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn progression_update(progression: &UserProgression) -> StoreResult<Document> {
    Ok(doc! {
        "$set": {
            "progression": to_bson(progression)?,
            "updatedAt": chrono_to_bson(Utc::now()),
        },
        "$inc": { "version": 1_i64 },
    })
}

/// Transient transaction failures (write conflicts, an unknown commit
/// outcome) are reported as `Conflict` so callers reload and retry.
fn transaction_error(err: mongodb::error::Error, resource: &str) -> StoreError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR)
        || err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
    {
        StoreError::Conflict(resource.to_string())
    } else {
        err.into()
    }
}

#[async_trait]
impl LearningStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        self.collection::<User>(USERS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        self.collection::<LessonCompletionRecord>(LESSON_PROGRESS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "completed_at": -1 })
                    .build(),
            )
            .await?;

        self.collection::<BadgeAward>(USER_BADGES)
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build())
            .await?;

        self.collection::<Lesson>(LESSONS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "is_active": 1, "difficulty": 1, "order": 1 })
                    .build(),
            )
            .await?;

        // Expired reset tokens are removed by MongoDB itself.
        self.collection::<PasswordReset>(PASSWORD_RESETS)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expiresAt": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(std::time::Duration::from_secs(0))
                            .build(),
                    )
                    .build(),
            )
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        match self.collection::<User>(USERS).insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::Duplicate(format!("user {}", user.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .collection::<User>(USERS)
            .find_one(doc! { "_id": user_id })
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .collection::<User>(USERS)
            .find_one(doc! { "email": email })
            .await?)
    }

    async fn save_progression(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
    ) -> StoreResult<i64> {
        let result = self
            .collection::<User>(USERS)
            .update_one(
                doc! { "_id": user_id, "version": expected_version },
                progression_update(progression)?,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::Conflict(format!("users/{}", user_id)));
        }
        Ok(expected_version + 1)
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        self.collection::<User>(USERS)
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "password_hash": password_hash,
                    "updatedAt": chrono_to_bson(Utc::now()),
                } },
            )
            .await?;
        Ok(())
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.collection::<User>(USERS)
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "lastLoginAt": chrono_to_bson(at) } },
            )
            .await?;
        Ok(())
    }

    async fn upsert_category(&self, category: &Category) -> StoreResult<()> {
        self.collection::<Category>(CATEGORIES)
            .replace_one(doc! { "_id": &category.id }, category)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> StoreResult<()> {
        self.collection::<Lesson>(LESSONS)
            .replace_one(doc! { "_id": &lesson.id }, lesson)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn upsert_badge(&self, badge: &BadgeDefinition) -> StoreResult<()> {
        self.collection::<BadgeDefinition>(BADGES)
            .replace_one(doc! { "_id": &badge.id }, badge)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let cursor = self
            .collection::<Category>(CATEGORIES)
            .find(doc! {})
            .sort(doc! { "order": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_lessons(&self, difficulties: &[Difficulty]) -> StoreResult<Vec<Lesson>> {
        let difficulties: Vec<&str> = difficulties.iter().map(|d| d.as_str()).collect();
        let cursor = self
            .collection::<Lesson>(LESSONS)
            .find(doc! {
                "is_active": true,
                "difficulty": { "$in": difficulties },
            })
            .sort(doc! { "order": 1, "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_lesson(&self, lesson_id: &str) -> StoreResult<Option<Lesson>> {
        Ok(self
            .collection::<Lesson>(LESSONS)
            .find_one(doc! { "_id": lesson_id })
            .await?)
    }

    async fn count_active_lessons(&self) -> StoreResult<u64> {
        Ok(self
            .collection::<Lesson>(LESSONS)
            .count_documents(doc! { "is_active": true })
            .await?)
    }

    async fn list_badges(&self) -> StoreResult<Vec<BadgeDefinition>> {
        let cursor = self
            .collection::<BadgeDefinition>(BADGES)
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_completion(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> StoreResult<Option<LessonCompletionRecord>> {
        let key = LessonCompletionRecord::key(user_id, lesson_id);
        Ok(self
            .collection::<LessonCompletionRecord>(LESSON_PROGRESS)
            .find_one(doc! { "_id": key })
            .await?)
    }

    async fn commit_completion(
        &self,
        user_id: &str,
        expected_version: i64,
        progression: &UserProgression,
        previous_attempts: Option<u32>,
        record: &LessonCompletionRecord,
    ) -> StoreResult<i64> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let written = self
            .write_completion(
                &mut session,
                user_id,
                expected_version,
                progression,
                previous_attempts,
                record,
            )
            .await;

        match written {
            Ok(version) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|e| transaction_error(e, &record.id))?;
                Ok(version)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(
                        error = %abort,
                        record = %record.id,
                        "Failed to abort completion transaction"
                    );
                }
                Err(e)
            }
        }
    }

    async fn list_completions(&self, user_id: &str) -> StoreResult<Vec<LessonCompletionRecord>> {
        let cursor = self
            .collection::<LessonCompletionRecord>(LESSON_PROGRESS)
            .find(doc! { "user_id": user_id })
            .sort(doc! { "completed_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_awards(&self, user_id: &str) -> StoreResult<Vec<BadgeAward>> {
        let cursor = self
            .collection::<BadgeAward>(USER_BADGES)
            .find(doc! { "user_id": user_id })
            .sort(doc! { "earnedAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_award(&self, award: &BadgeAward) -> StoreResult<bool> {
        match self
            .collection::<BadgeAward>(USER_BADGES)
            .insert_one(award)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_assessment(&self, record: &AssessmentRecord) -> StoreResult<()> {
        self.collection::<AssessmentRecord>(ASSESSMENTS)
            .replace_one(doc! { "_id": &record.user_id }, record)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn find_assessment(&self, user_id: &str) -> StoreResult<Option<AssessmentRecord>> {
        Ok(self
            .collection::<AssessmentRecord>(ASSESSMENTS)
            .find_one(doc! { "_id": user_id })
            .await?)
    }

    async fn save_password_reset(&self, reset: &PasswordReset) -> StoreResult<()> {
        self.collection::<PasswordReset>(PASSWORD_RESETS)
            .replace_one(doc! { "_id": &reset.token_hash }, reset)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn take_password_reset(&self, token_hash: &str) -> StoreResult<Option<PasswordReset>> {
        Ok(self
            .collection::<PasswordReset>(PASSWORD_RESETS)
            .find_one_and_delete(doc! { "_id": token_hash })
            .await?)
    }
}
