use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(value: redis::RedisError) -> Self {
        StorageError::Backend(value.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::CorruptInput(value.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(value: tokio::task::JoinError) -> Self {
        StorageError::Backend(format!("blocking task failed: {value}"))
    }
}

impl From<StorageError> for scalpy_core::ScalpyError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Validation(msg) => scalpy_core::ScalpyError::Validation(msg),
            StorageError::Backend(msg) => scalpy_core::ScalpyError::Transport(msg),
            StorageError::CorruptInput(msg) => scalpy_core::ScalpyError::CorruptInput(msg),
        }
    }
}

impl From<scalpy_connectors::ConnectorError> for StorageError {
    fn from(value: scalpy_connectors::ConnectorError) -> Self {
        StorageError::Backend(value.to_string())
    }
}
