use thiserror::Error;

use crate::enums::DataType;

/// Error taxonomy shared by the backtest engine and its external
/// collaborators (connector, storage, history provider).
#[derive(Debug, Error)]
pub enum ScalpyError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} is not implemented for {1}")]
    NotImplemented(&'static str, DataType),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("run was cancelled")]
    Cancelled,

    #[error("stage failed: {0}")]
    StageFailure(String),
}
