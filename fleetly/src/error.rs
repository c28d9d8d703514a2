use thiserror::Error;

/// Errors produced while building or running a [`crate::Fleetly`] graph.
#[derive(Debug, Error)]
pub enum FleetlyError {
    #[error("stage '{0}' is a source and cannot accept inbound edges")]
    SourceCannotHaveInbound(String),

    #[error("stage '{0}' is a sink and cannot have outbound edges")]
    SinkCannotHaveOutbound(String),

    #[error("a stage cannot be connected to itself")]
    SelfLoop,

    #[error("graph contains a cycle reachable from stage '{0}'")]
    Cyclic(String),

    #[error("downstream stage dropped its inbound queue")]
    ChannelClosed,

    #[error("stage task panicked: {0}")]
    StageFailed(String),

    #[error("run was cancelled before completion")]
    Cancelled,
}

impl From<tokio::task::JoinError> for FleetlyError {
    fn from(value: tokio::task::JoinError) -> Self {
        if value.is_cancelled() {
            FleetlyError::Cancelled
        } else {
            FleetlyError::StageFailed(value.to_string())
        }
    }
}
