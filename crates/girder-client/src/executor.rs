use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use girder_core::{EngineConnection, EngineFailure, EngineOperation, OperationOutcome};

use crate::adapter::adapt_failure;
use crate::promise::{OperationPromise, PromiseCompleter};

/// Runs an operation to completion on the calling thread. Failures propagate
/// unchanged: translation into the caller taxonomy happens only on the
/// asynchronous path.
pub struct SyncExecutor;

impl SyncExecutor {
    #[instrument(
        skip_all,
        fields(operation_id = %operation.settings.operation_id, kind = operation.kind.label())
    )]
    pub fn run(
        connection: &dyn EngineConnection,
        operation: &EngineOperation,
    ) -> Result<OperationOutcome, EngineFailure> {
        let result = connection.execute(operation);
        if let Err(failure) = &result {
            debug!(%failure, "participant reported failure");
        }
        result
    }
}

/// Schedules blocking participant calls on the client's shared worker
/// runtime and settles the returned promise exactly once with the adapted
/// outcome.
#[derive(Clone)]
pub struct AsyncExecutor {
    handle: Handle,
}

impl AsyncExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Submit a blocking task. The caller gets the promise back immediately;
    /// the task's engine-side failure, if any, reaches the promise as a
    /// [`crate::error::ClientError`].
    pub fn submit<T, F>(&self, cancellation: CancellationToken, task: F) -> OperationPromise<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, EngineFailure> + Send + 'static,
    {
        let (promise, completer) = OperationPromise::pending(cancellation);
        self.spawn(completer, task);
        promise
    }

    fn spawn<T, F>(&self, completer: PromiseCompleter<T>, task: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, EngineFailure> + Send + 'static,
    {
        self.handle.spawn_blocking(move || {
            let result = task().map_err(adapt_failure);
            completer.complete(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::time::Duration;

    fn executor() -> (tokio::runtime::Runtime, AsyncExecutor) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let executor = AsyncExecutor::new(runtime.handle().clone());
        (runtime, executor)
    }

    #[test]
    fn submit_returns_before_completion() {
        let (_runtime, executor) = executor();
        let promise = executor.submit(CancellationToken::new(), || {
            std::thread::sleep(Duration::from_millis(50));
            Ok(1u32)
        });
        // The slow task should still be running when submit returns.
        assert!(!promise.is_settled());
        assert_eq!(promise.wait(), Ok(1));
    }

    #[test]
    fn failures_reach_the_promise_adapted() {
        let (_runtime, executor) = executor();
        let promise = executor.submit::<u32, _>(CancellationToken::new(), || {
            Err(EngineFailure::Cancelled)
        });
        assert_eq!(promise.wait(), Err(ClientError::OperationCancelled));
    }

    #[test]
    fn panicking_task_settles_the_promise() {
        let (_runtime, executor) = executor();
        let promise = executor.submit::<u32, _>(CancellationToken::new(), || {
            panic!("worker died");
        });
        match promise.wait() {
            Err(ClientError::OperationFailed(msg)) => {
                assert!(msg.contains("without reporting"), "got: {msg}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
