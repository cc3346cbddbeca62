use crate::events::ListenerError;

/// Typed failures reported by a participant connection. This is the closed
/// set the engine side can signal; the client maps it onto the caller-facing
/// taxonomy before failures reach an async callback.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineFailure {
    #[error("connection to build engine broken: {0}")]
    ConnectionBroken(String),

    #[error("engine does not provide model '{0}'")]
    UnsupportedModel(String),

    #[error("engine rejected build argument: {0}")]
    UnsupportedBuildArgument(String),

    #[error("engine rejected operation configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("test execution failed: {0}")]
    TestExecutionFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("progress listener notification failed: {0}")]
    ListenerNotification(String),

    #[error("engine protocol violation: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

impl From<ListenerError> for EngineFailure {
    fn from(err: ListenerError) -> Self {
        Self::ListenerNotification(err.0)
    }
}
