use scalpy_core::DataType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} is not supported by this connector for {1}")]
    NotImplemented(&'static str, DataType),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(value: reqwest::Error) -> Self {
        ConnectorError::Transport(value.to_string())
    }
}

impl From<ConnectorError> for scalpy_core::ScalpyError {
    fn from(value: ConnectorError) -> Self {
        match value {
            ConnectorError::Validation(msg) => scalpy_core::ScalpyError::Validation(msg),
            ConnectorError::NotImplemented(op, kind) => {
                scalpy_core::ScalpyError::NotImplemented(op, kind)
            }
            ConnectorError::Transport(msg) => scalpy_core::ScalpyError::Transport(msg),
            ConnectorError::CorruptInput(msg) => scalpy_core::ScalpyError::CorruptInput(msg),
        }
    }
}
