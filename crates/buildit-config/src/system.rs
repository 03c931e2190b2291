//! Collaborator wiring read from the process environment (§6.4).
//!
//! Centralises the `std::env::var` lookups every collaborator's
//! constructor needs, so callers build one `EnvConfig` at startup instead
//! of scattering `env::var` calls through `buildit-db`/`buildit-cache`/
//! `buildit-storage`/`buildit-queue`.

use crate::error::{ConfigError, ConfigResult};

fn require(key: &str) -> ConfigResult<String> {
    std::env::var(key).map_err(|_| ConfigError::at_zero(format!("missing environment variable '{key}'")))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: Option<String>,
    pub ssl_ca: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub default_bucket: String,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub rabbitmq_url: String,
    pub task_queue: String,
    pub job_queue_url: String,
    pub job_queue_name: String,
}

/// Everything a collaborator needs to dial out, assembled once at
/// process startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub minio: MinioConfig,
    pub queue: QueueConfig,
}

/// Tuning knobs for the worker pool controller (C9), read separately from
/// [`EnvConfig`] since only the controller binary needs them.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub namespace: String,
    pub worker_image: String,
    pub poll_interval_seconds: u64,
    pub max_messages_per_poll: u32,
}

impl WorkerPoolConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            namespace: require("WORKER_NAMESPACE")?,
            worker_image: require("WORKER_IMAGE")?,
            poll_interval_seconds: optional("WORKER_POLL_INTERVAL_SECONDS")
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| ConfigError::at_zero("WORKER_POLL_INTERVAL_SECONDS must be an integer"))?
                .unwrap_or(15),
            max_messages_per_poll: optional("WORKER_MAX_MESSAGES_PER_POLL")
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| ConfigError::at_zero("WORKER_MAX_MESSAGES_PER_POLL must be an integer"))?
                .unwrap_or(10),
        })
    }
}

impl EnvConfig {
    /// Read every recognised variable from the process environment.
    /// Fails fast on the first missing required variable; `DB_SSL_MODE`,
    /// `DB_SSL_CA`, `REDIS_USERNAME`, and `REDIS_PASSWORD` are optional.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            db: DbConfig {
                host: require("DB_HOST")?,
                port: require("DB_PORT")?
                    .parse()
                    .map_err(|_| ConfigError::at_zero("DB_PORT must be a valid port number"))?,
                user: require("DB_USER")?,
                password: require("DB_PASSWORD")?,
                name: require("DB_NAME")?,
                ssl_mode: optional("DB_SSL_MODE"),
                ssl_ca: optional("DB_SSL_CA"),
            },
            redis: RedisConfig {
                host: require("REDIS_HOST")?,
                port: require("REDIS_PORT")?
                    .parse()
                    .map_err(|_| ConfigError::at_zero("REDIS_PORT must be a valid port number"))?,
                username: optional("REDIS_USERNAME"),
                password: optional("REDIS_PASSWORD"),
            },
            minio: MinioConfig {
                endpoint: require("MINIO_ENDPOINT")?,
                access_key: require("MINIO_ACCESS_KEY")?,
                secret_key: require("MINIO_SECRET_KEY")?,
                default_bucket: require("DEFAULT_BUCKET")?,
            },
            queue: QueueConfig {
                rabbitmq_url: require("RABBITMQ_URL")?,
                task_queue: require("TASK_QUEUE")?,
                job_queue_url: require("JOB_QUEUE_URL")?,
                job_queue_name: require("JOB_QUEUE_NAME")?,
            },
        })
    }
}
