use std::io;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;

use girder_core::{ActionDescriptor, ConnectionFactory, LaunchSpec, ModelKind, TestSpec};

use crate::composite::CompositeBuilder;
use crate::error::ShutdownError;
use crate::executor::AsyncExecutor;
use crate::pool::{ConnectionPool, ShutdownStrategy};
use crate::request::{ActionExecution, BuildLaunch, ModelFetch, Request, TestLaunch};

pub(crate) struct ClientInner {
    pub(crate) pool: ConnectionPool,
    pub(crate) executor: AsyncExecutor,
    // Keeps the worker pool alive for the lifetime of the client; dropped
    // (and with it the runtime) only when the last handle goes away.
    _runtime: Runtime,
}

/// Entry point for callers: builds requests against pooled engine
/// connections without managing connection lifecycle, worker scheduling, or
/// result-delivery mode itself. Cheap to clone; all clones share the pool
/// and the worker runtime.
#[derive(Clone)]
pub struct ToolingClient {
    inner: Arc<ClientInner>,
}

impl ToolingClient {
    /// Create a client around the given connection factory. Spawns the
    /// process-wide worker runtime used by all asynchronous executions.
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("girder-worker")
            .enable_all()
            .build()?;
        let executor = AsyncExecutor::new(runtime.handle().clone());
        info!("tooling client started");
        Ok(Self {
            inner: Arc::new(ClientInner {
                pool: ConnectionPool::new(factory),
                executor,
                _runtime: runtime,
            }),
        })
    }

    /// Build a request that fetches a typed model.
    pub fn new_model_request(&self, kind: ModelKind) -> Request<ModelFetch> {
        Request::new(Arc::clone(&self.inner), ModelFetch::new(kind))
    }

    /// Build a request that executes an opaque action inside the engine.
    pub fn new_action_request(&self, action: ActionDescriptor) -> Request<ActionExecution> {
        Request::new(Arc::clone(&self.inner), ActionExecution::new(action))
    }

    /// Build a request that launches a build.
    pub fn new_build_request(&self, spec: LaunchSpec) -> Request<BuildLaunch> {
        Request::new(Arc::clone(&self.inner), BuildLaunch::new(spec))
    }

    /// Build a request that launches tests.
    pub fn new_test_request(&self, spec: TestSpec) -> Request<TestLaunch> {
        Request::new(Arc::clone(&self.inner), TestLaunch::new(spec))
    }

    /// Start collecting participants for a composite model request.
    pub fn new_composite_builder(&self) -> CompositeBuilder {
        CompositeBuilder::new(self.inner.executor.handle().clone())
    }

    /// Number of currently pooled connections.
    pub fn pooled_connections(&self) -> usize {
        self.inner.pool.len()
    }

    /// Shut the client's connections down. Graceful shutdown closes every
    /// pooled connection and resets the factory; the client itself stays
    /// usable and may open new connections afterwards.
    pub fn shutdown(&self, strategy: ShutdownStrategy) -> Result<(), ShutdownError> {
        self.inner.pool.shutdown(strategy)
    }
}
