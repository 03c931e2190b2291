//! Object storage errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create bucket '{bucket}': {source}")]
    BucketInit {
        bucket: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to upload logs to bucket '{bucket}' as '{object}': {source}")]
    Upload {
        bucket: String,
        object: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
