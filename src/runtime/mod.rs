//! 检测会话的进程内运行时：每个活动会话一个帧队列和一个消费者任务

pub mod notifier;
pub mod registry;

use thiserror::Error;

use crate::response::AppError;
use crate::store::StoreError;

pub use registry::{SessionHandle, SessionRegistry};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("detection session not found: {0}")]
    NotFound(String),
    #[error("detection session already stopped: {0}")]
    Stopped(String),
    #[error("frame queue is full for session {0}")]
    QueueFull(String),
    #[error("active detection session limit reached ({limit})")]
    TooManySessions { limit: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RuntimeError> for AppError {
    fn from(value: RuntimeError) -> Self {
        match value {
            RuntimeError::NotFound(_) => AppError::not_found("Detection session not found"),
            RuntimeError::Stopped(_) => AppError::conflict(
                "DETECTION_SESSION_STOPPED",
                "Detection session is no longer running",
            ),
            RuntimeError::QueueFull(_) => AppError::too_many_requests(
                "DETECTION_QUEUE_FULL",
                "Frame queue is full, slow down",
            ),
            RuntimeError::TooManySessions { limit } => AppError::conflict(
                "DETECTION_SESSION_LIMIT",
                &format!("At most {limit} detection sessions may run at once"),
            ),
            RuntimeError::Store(e) => e.into(),
        }
    }
}
