//! Waitboard errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key does not exist: {0}")]
    Miss(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
