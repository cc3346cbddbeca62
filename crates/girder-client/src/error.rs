use crate::pool::ShutdownStrategy;

/// Caller-facing failure taxonomy. Every failure delivered through a promise
/// or a result handler is one of these; raw engine-side failures never cross
/// that boundary.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("could not establish or reuse a participant connection: {0}")]
    ConnectionFailure(String),

    #[error("unsupported model requested: {0}")]
    UnsupportedModel(String),

    #[error("participant rejected a configured argument: {0}")]
    UnsupportedArgument(String),

    #[error("operation cancelled")]
    OperationCancelled,

    #[error("a progress listener failed during notification: {0}")]
    ListenerFailed(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("shutdown strategy {0:?} is not supported")]
    UnsupportedStrategy(ShutdownStrategy),
}
