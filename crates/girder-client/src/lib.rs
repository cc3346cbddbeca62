//! Client-side orchestration for external build-engine processes: keyed
//! pooling of engine connections, uniform operation configuration, blocking
//! and promise-based execution, and composite aggregation of participant
//! project hierarchies.

pub mod adapter;
pub mod client;
pub mod composite;
pub mod error;
pub mod executor;
mod mapper;
pub mod mock;
pub mod pool;
pub mod promise;
pub mod request;

pub use adapter::{adapt_failure, ResultHandler, ResultHandlerAdapter};
pub use client::ToolingClient;
pub use composite::{CompositeBuild, CompositeBuilder};
pub use error::{ClientError, ShutdownError};
pub use executor::{AsyncExecutor, SyncExecutor};
pub use pool::{ConnectionPool, ShutdownStrategy};
pub use promise::{OperationPromise, PromiseCompleter};
pub use request::{
    ActionExecution, BuildLaunch, ModelFetch, Operation, Request, RequestConfig, TestLaunch,
};
