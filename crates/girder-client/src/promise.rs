use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ClientError;

enum State<T> {
    Pending {
        on_complete: Vec<Box<dyn FnOnce(&T) + Send>>,
        on_failure: Vec<Box<dyn FnOnce(&ClientError) + Send>>,
        wakers: Vec<Waker>,
    },
    Settled(Arc<Result<T, ClientError>>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

/// Handle to one in-flight or finished operation. Carries at most one
/// terminal outcome: the single slot behind `state` is written exactly once,
/// and every observer (blocking waiters, pollers, callbacks, futures) reads
/// that same slot.
pub struct OperationPromise<T> {
    shared: Arc<Shared<T>>,
    cancellation: CancellationToken,
}

impl<T> Clone for OperationPromise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            cancellation: self.cancellation.clone(),
        }
    }
}

/// Write side of a promise. Held by the worker that runs the operation.
pub struct PromiseCompleter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> OperationPromise<T> {
    /// A fresh pending promise plus its single-use completer. `cancellation`
    /// is the token configured into the underlying operation; `cancel()`
    /// triggers it.
    pub fn pending(cancellation: CancellationToken) -> (Self, PromiseCompleter<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending {
                on_complete: Vec::new(),
                on_failure: Vec::new(),
                wakers: Vec::new(),
            }),
            settled: Condvar::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
                cancellation,
            },
            PromiseCompleter { shared },
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Settled(_))
    }

    /// Signal cooperative cancellation to the running operation. Best-effort:
    /// the promise settles once the participant observes the token.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Register a success observer. Invoked at most once, after the promise
    /// settles successfully; invoked immediately if it already has.
    pub fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let mut f = Some(f);
        let already = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending { on_complete, .. } => {
                    if let Some(f) = f.take() {
                        on_complete.push(Box::new(f));
                    }
                    None
                }
                State::Settled(result) => Some(Arc::clone(result)),
            }
        };
        if let (Some(result), Some(f)) = (already, f.take()) {
            if let Ok(value) = result.as_ref() {
                f(value);
            }
        }
    }

    /// Register a failure observer. Same delivery rules as [`on_complete`].
    ///
    /// [`on_complete`]: OperationPromise::on_complete
    pub fn on_failure<F>(&self, f: F)
    where
        F: FnOnce(&ClientError) + Send + 'static,
    {
        let mut f = Some(f);
        let already = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending { on_failure, .. } => {
                    if let Some(f) = f.take() {
                        on_failure.push(Box::new(f));
                    }
                    None
                }
                State::Settled(result) => Some(Arc::clone(result)),
            }
        };
        if let (Some(result), Some(f)) = (already, f.take()) {
            if let Err(failure) = result.as_ref() {
                f(failure);
            }
        }
    }
}

impl<T: Clone> OperationPromise<T> {
    /// Non-blocking poll of the terminal outcome.
    pub fn try_result(&self) -> Option<Result<T, ClientError>> {
        match &*self.shared.state.lock() {
            State::Settled(result) => Some((**result).clone()),
            State::Pending { .. } => None,
        }
    }

    /// Block the calling thread until the operation settles, then return its
    /// terminal outcome.
    pub fn wait(&self) -> Result<T, ClientError> {
        let mut state = self.shared.state.lock();
        loop {
            if let State::Settled(result) = &*state {
                return (**result).clone();
            }
            self.shared.settled.wait(&mut state);
        }
    }
}

impl<T: Clone> Future for OperationPromise<T> {
    type Output = Result<T, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Settled(result) => Poll::Ready((**result).clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> PromiseCompleter<T> {
    /// Settle the promise. The first terminal outcome wins; a second attempt
    /// is ignored and returns false.
    pub fn complete(&self, result: Result<T, ClientError>) -> bool {
        let settled = Arc::new(result);
        let mut state = self.shared.state.lock();
        let prev = std::mem::replace(&mut *state, State::Settled(Arc::clone(&settled)));
        let (on_complete, on_failure, wakers) = match prev {
            State::Settled(first) => {
                *state = State::Settled(first);
                drop(state);
                warn!("ignoring repeated completion of an already settled operation");
                return false;
            }
            State::Pending {
                on_complete,
                on_failure,
                wakers,
            } => (on_complete, on_failure, wakers),
        };
        self.shared.settled.notify_all();
        drop(state);

        match settled.as_ref() {
            Ok(value) => {
                for callback in on_complete {
                    callback(value);
                }
            }
            Err(failure) => {
                for callback in on_failure {
                    callback(failure);
                }
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T> Drop for PromiseCompleter<T> {
    fn drop(&mut self) {
        // A worker that dies without reporting must not leave waiters hanging.
        let pending = matches!(&*self.shared.state.lock(), State::Pending { .. });
        if pending {
            self.complete(Err(ClientError::OperationFailed(
                "operation worker dropped without reporting a result".into(),
            )));
        }
    }
}
