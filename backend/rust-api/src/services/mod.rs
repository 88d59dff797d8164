use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middlewares::auth::JwtService;
use crate::models::user::User;
use crate::progression::UserProgression;
use crate::repositories::{
    CompletionLocks, LearningStore, MemoryLocks, MemoryStore, MongoStore, RedisLocks, StoreError,
};
use crate::utils::retry::{retry_async_when, retry_async_with_config, RetryConfig};
use crate::utils::time::today_in;

pub mod assessment_service;
pub mod auth_service;
pub mod catalog_seed;
pub mod completion_service;
pub mod lesson_service;
pub mod progress_service;
pub mod user_service;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LearningStore>,
    pub locks: Arc<dyn CompletionLocks>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn LearningStore>,
        locks: Arc<dyn CompletionLocks>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt_secret);
        Self {
            config,
            store,
            locks,
            jwt,
        }
    }

    /// Connects the configured backends, ensures indexes and seeds the catalog.
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let state = match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Self::new(
                    config,
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryLocks::new()),
                )
            }
            StorageBackend::Mongo => {
                let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
                let store = MongoStore::new(mongo_client, &config.mongo_database);

                retry_async_with_config(RetryConfig::default(), || store.ping()).await?;
                tracing::info!("MongoDB connected");

                let redis = connect_redis(&config.redis_uri).await?;
                Self::new(config, Arc::new(store), Arc::new(RedisLocks::new(redis)))
            }
        };

        state.store.ensure_indexes().await?;

        if state.config.seed_catalog {
            let catalog = catalog_seed::load_catalog(state.config.catalog_file.as_deref()).await?;
            catalog_seed::seed_catalog(state.store.as_ref(), &catalog).await?;
        }

        Ok(state)
    }

    pub fn today(&self) -> NaiveDate {
        today_in(self.config.utc_offset())
    }

    pub async fn load_user(&self, user_id: &str) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    /// Applies `change` to the user's progression under the optimistic version
    /// check, reloading and retrying on conflict.
    pub async fn update_progression<F>(
        &self,
        user_id: &str,
        operation: &'static str,
        change: F,
    ) -> AppResult<UserProgression>
    where
        F: Fn(&mut UserProgression) + Send + Sync,
    {
        let change = &change;
        retry_async_when(RetryConfig::default(), is_version_conflict, || async move {
            let user = self.load_user(user_id).await?;
            let mut progression = user.progression;
            change(&mut progression);

            self.store
                .save_progression(user_id, user.version, &progression)
                .await
                .map_err(|e| {
                    if e.is_conflict() {
                        metrics::record_persistence_conflict(operation);
                    }
                    AppError::from(e)
                })?;
            Ok(progression)
        })
        .await
    }
}

pub(crate) fn is_version_conflict(error: &AppError) -> bool {
    matches!(error, AppError::Store(StoreError::Conflict(_)))
}

async fn connect_redis(redis_uri: &str) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let redis_client = redis::Client::open(redis_uri)?;
    let redis = tokio::time::timeout(
        Duration::from_secs(30),
        ConnectionManager::new(redis_client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}
