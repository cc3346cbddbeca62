use girder_core::EngineFailure;

use crate::error::ClientError;

/// Map an engine-side failure onto the caller-facing taxonomy. The match is
/// exhaustive on purpose: a new engine-side failure kind cannot be added
/// without deciding its caller-facing category here.
pub fn adapt_failure(failure: EngineFailure) -> ClientError {
    match failure {
        EngineFailure::ConnectionBroken(msg) => ClientError::ConnectionFailure(msg),
        EngineFailure::UnsupportedModel(name) => ClientError::UnsupportedModel(name),
        EngineFailure::UnsupportedBuildArgument(msg) => ClientError::UnsupportedArgument(msg),
        EngineFailure::UnsupportedConfiguration(msg) => ClientError::UnsupportedArgument(msg),
        EngineFailure::Cancelled => ClientError::OperationCancelled,
        EngineFailure::ListenerNotification(msg) => ClientError::ListenerFailed(msg),
        EngineFailure::BuildFailed(msg) => ClientError::OperationFailed(msg),
        EngineFailure::TestExecutionFailed(msg) => ClientError::OperationFailed(msg),
        EngineFailure::Protocol(msg) => ClientError::OperationFailed(msg),
        EngineFailure::Other(msg) => ClientError::OperationFailed(msg),
    }
}

/// Callback pair for asynchronous result delivery. Exactly one of the two
/// methods is invoked per operation.
pub trait ResultHandler<T>: Send + Sync {
    fn on_complete(&self, value: T);
    fn on_failure(&self, failure: ClientError);
}

/// Wraps a caller-supplied handler so it only ever observes the taxonomy.
pub struct ResultHandlerAdapter<H> {
    inner: H,
}

impl<H> ResultHandlerAdapter<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn deliver<T>(&self, result: Result<T, EngineFailure>)
    where
        H: ResultHandler<T>,
    {
        match result {
            Ok(value) => self.inner.on_complete(value),
            Err(failure) => self.inner.on_failure(adapt_failure(failure)),
        }
    }
}
