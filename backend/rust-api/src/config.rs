use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: String,
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    /// Offset from UTC used to decide which calendar day "today" is.
    pub utc_offset_minutes: i32,
    pub seed_catalog: bool,
    /// Catalog JSON to seed from instead of the bundled one.
    pub catalog_file: Option<String>,
    /// Return password reset tokens in the API response (no mail delivery).
    pub expose_reset_tokens: bool,
    /// `user:password` for Basic auth on /metrics.
    pub metrics_auth: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let string = |key: &str, legacy: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(legacy).ok())
                .filter(|v| !v.trim().is_empty())
        };

        let storage_backend = match string("storage.backend", "STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Mongo,
        };

        let mongo_uri = string("database.mongo_uri", "MONGO_URI").unwrap_or_else(|| {
            match (env::var("MONGO_USER"), env::var("MONGO_PASSWORD")) {
                (Ok(user), Ok(password)) => {
                    let db = env::var("MONGO_DB").unwrap_or_else(|_| "techsteps".to_string());
                    eprintln!("WARNING: Building MongoDB URI from MONGO_USER/MONGO_PASSWORD env vars");
                    format!(
                        "mongodb://{}:{}@localhost:27017/{}?authSource=admin",
                        user, password, db
                    )
                }
                _ => "mongodb://localhost:27017".to_string(),
            }
        });

        let redis_uri = string("redis.uri", "REDIS_URI").unwrap_or_else(|| {
            let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
            match env::var("REDIS_PASSWORD") {
                Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                Err(_) => format!("redis://{}:{}/0", host, port),
            }
        });

        let mongo_database = string("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "techsteps".to_string());

        let jwt_secret = match string("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if environment == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                DEV_JWT_SECRET.to_string()
            }
        };
        if environment == "prod" && jwt_secret == DEV_JWT_SECRET {
            return Err(config::ConfigError::Message(
                "the development JWT secret cannot be used in production".to_string(),
            ));
        }

        let access_token_ttl_seconds = parse_or(
            string("auth.access_token_ttl_seconds", "JWT_ACCESS_TOKEN_TTL_SECONDS"),
            3600,
        )?;
        let bcrypt_cost = parse_or(
            string("auth.bcrypt_cost", "BCRYPT_COST"),
            bcrypt::DEFAULT_COST,
        )?;
        let utc_offset_minutes: i32 = parse_or(string("app.utc_offset_minutes", "UTC_OFFSET_MINUTES"), 0)?;
        if FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(config::ConfigError::Message(format!(
                "utc_offset_minutes out of range: {}",
                utc_offset_minutes
            )));
        }

        Ok(Config {
            bind_addr: string("server.bind_addr", "BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8081".to_string()),
            storage_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            access_token_ttl_seconds,
            bcrypt_cost,
            utc_offset_minutes,
            seed_catalog: parse_or(string("catalog.seed", "SEED_CATALOG"), true)?,
            catalog_file: string("catalog.file", "CATALOG_FILE"),
            expose_reset_tokens: parse_or(
                string("auth.expose_reset_tokens", "EXPOSE_RESET_TOKENS"),
                environment != "prod",
            )?,
            metrics_auth: string("metrics.auth", "METRICS_AUTH")
                .unwrap_or_else(|| "admin:changeme".to_string()),
            environment,
        })
    }

    /// Self-contained configuration backed by the in-memory store.
    pub fn in_memory() -> Self {
        Config {
            environment: "test".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: String::new(),
            redis_uri: String::new(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_seconds: 3600,
            bcrypt_cost: 4,
            utc_offset_minutes: 0,
            seed_catalog: true,
            catalog_file: None,
            expose_reset_tokens: true,
            metrics_auth: "admin:changeme".to_string(),
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> Result<T, config::ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e| {
            config::ConfigError::Message(format!("invalid value {:?}: {}", raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_aliases() {
        assert_eq!("mongodb".parse::<StorageBackend>().unwrap(), StorageBackend::Mongo);
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn parse_or_falls_back_and_reports_bad_values() {
        assert_eq!(parse_or::<u32>(None, 7).unwrap(), 7);
        assert_eq!(parse_or::<u32>(Some(" 12 ".to_string()), 7).unwrap(), 12);
        assert!(parse_or::<bool>(Some("maybe".to_string()), true).is_err());
    }

    #[test]
    fn in_memory_config_uses_utc() {
        let config = Config::in_memory();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.utc_offset().local_minus_utc(), 0);
    }
}
