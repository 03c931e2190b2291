//! Queue transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
