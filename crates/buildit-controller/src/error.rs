//! Controller errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Queue(#[from] buildit_queue::QueueError),
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
