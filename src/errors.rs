use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("task not found: {category} / {task}")]
    UnknownTask { category: String, task: String },

    #[error("no timer is running")]
    NotRunning,

    #[error("a timer is already running: {category} / {task}")]
    AlreadyRunning { category: String, task: String },

    #[error("no exception task at index {0}")]
    NoSuchExceptionTask(usize),
}
