use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use girder_core::{
    ActionDescriptor, Distribution, EngineFailure, EngineModel, LaunchSpec, ModelKind,
    OperationEventListener, OperationKind, OperationOutcome, ProgressListener, SharedReader,
    SharedWriter, TestSpec,
};

use crate::client::ClientInner;
use crate::executor::SyncExecutor;
use crate::mapper;
use crate::promise::OperationPromise;

/// The descriptor for one operation: where to connect, how to run, and who
/// observes progress. Populated through the fluent setters on [`Request`]
/// and frozen when the operation starts. An empty `project_dir` means "let
/// the connection factory decide" (typically the current directory).
#[derive(Clone)]
pub struct RequestConfig {
    pub(crate) project_dir: PathBuf,
    pub(crate) engine_user_home: Option<PathBuf>,
    pub(crate) distribution: Distribution,
    pub(crate) standard_output: Option<SharedWriter>,
    pub(crate) standard_error: Option<SharedWriter>,
    pub(crate) standard_input: Option<SharedReader>,
    pub(crate) color_output: bool,
    pub(crate) runtime_home: Option<PathBuf>,
    pub(crate) runtime_arguments: Vec<String>,
    pub(crate) engine_arguments: Vec<String>,
    pub(crate) environment: Option<HashMap<String, String>>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) progress_listeners: Vec<Arc<dyn ProgressListener>>,
    pub(crate) event_listeners: Vec<Arc<dyn OperationEventListener>>,
}

impl RequestConfig {
    pub(crate) fn new() -> Self {
        Self {
            project_dir: PathBuf::new(),
            engine_user_home: None,
            distribution: Distribution::Default,
            standard_output: None,
            standard_error: None,
            standard_input: None,
            color_output: false,
            runtime_home: None,
            runtime_arguments: Vec::new(),
            engine_arguments: Vec::new(),
            environment: None,
            cancellation: CancellationToken::new(),
            progress_listeners: Vec::new(),
            event_listeners: Vec::new(),
        }
    }
}

/// One of the four supported request shapes: produces the engine-side
/// operation kind and decodes the participant's outcome into a typed output.
pub trait Operation: Clone + Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn kind(&self) -> OperationKind;

    fn decode(&self, outcome: OperationOutcome) -> Result<Self::Output, EngineFailure>;
}

/// Fetch a typed model from one participant.
#[derive(Clone, Debug)]
pub struct ModelFetch {
    kind: ModelKind,
    tasks: Option<Vec<String>>,
}

impl ModelFetch {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind, tasks: None }
    }
}

impl Operation for ModelFetch {
    type Output = EngineModel;

    fn kind(&self) -> OperationKind {
        OperationKind::FetchModel {
            kind: self.kind,
            tasks: self.tasks.clone(),
        }
    }

    fn decode(&self, outcome: OperationOutcome) -> Result<EngineModel, EngineFailure> {
        match outcome {
            OperationOutcome::Model(model) if model.kind() == self.kind => Ok(model),
            other => Err(EngineFailure::Protocol(format!(
                "expected a {} model, got {other:?}",
                self.kind
            ))),
        }
    }
}

/// Execute an opaque action inside one participant.
#[derive(Clone, Debug)]
pub struct ActionExecution {
    action: ActionDescriptor,
}

impl ActionExecution {
    pub fn new(action: ActionDescriptor) -> Self {
        Self { action }
    }
}

impl Operation for ActionExecution {
    type Output = serde_json::Value;

    fn kind(&self) -> OperationKind {
        OperationKind::RunAction {
            action: self.action.clone(),
        }
    }

    fn decode(&self, outcome: OperationOutcome) -> Result<serde_json::Value, EngineFailure> {
        match outcome {
            OperationOutcome::ActionValue(value) => Ok(value),
            other => Err(EngineFailure::Protocol(format!(
                "expected an action result, got {other:?}"
            ))),
        }
    }
}

/// Launch a build on one participant.
#[derive(Clone, Debug)]
pub struct BuildLaunch {
    spec: LaunchSpec,
}

impl BuildLaunch {
    pub fn new(spec: LaunchSpec) -> Self {
        Self { spec }
    }
}

impl Operation for BuildLaunch {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::LaunchBuild {
            spec: self.spec.clone(),
        }
    }

    fn decode(&self, outcome: OperationOutcome) -> Result<(), EngineFailure> {
        match outcome {
            OperationOutcome::Completed => Ok(()),
            other => Err(EngineFailure::Protocol(format!(
                "expected completion, got {other:?}"
            ))),
        }
    }
}

/// Launch tests on one participant.
#[derive(Clone, Debug)]
pub struct TestLaunch {
    spec: TestSpec,
}

impl TestLaunch {
    pub fn new(spec: TestSpec) -> Self {
        Self { spec }
    }
}

impl Operation for TestLaunch {
    type Output = ();

    fn kind(&self) -> OperationKind {
        OperationKind::LaunchTests {
            spec: self.spec.clone(),
        }
    }

    fn decode(&self, outcome: OperationOutcome) -> Result<(), EngineFailure> {
        match outcome {
            OperationOutcome::Completed => Ok(()),
            other => Err(EngineFailure::Protocol(format!(
                "expected completion, got {other:?}"
            ))),
        }
    }
}

/// Fluent builder for one operation against a pooled connection. Reusable:
/// each `execute*` call maps a fresh operation from the current
/// configuration.
pub struct Request<O: Operation> {
    client: Arc<ClientInner>,
    operation: O,
    config: RequestConfig,
}

impl<O: Operation> Request<O> {
    pub(crate) fn new(client: Arc<ClientInner>, operation: O) -> Self {
        Self {
            client,
            operation,
            config: RequestConfig::new(),
        }
    }

    pub fn project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.project_dir = dir.into();
        self
    }

    pub fn engine_user_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.engine_user_home = Some(dir.into());
        self
    }

    pub fn distribution(mut self, distribution: Distribution) -> Self {
        self.config.distribution = distribution;
        self
    }

    pub fn standard_output(mut self, writer: SharedWriter) -> Self {
        self.config.standard_output = Some(writer);
        self
    }

    pub fn standard_error(mut self, writer: SharedWriter) -> Self {
        self.config.standard_error = Some(writer);
        self
    }

    pub fn standard_input(mut self, reader: SharedReader) -> Self {
        self.config.standard_input = Some(reader);
        self
    }

    pub fn color_output(mut self, enabled: bool) -> Self {
        self.config.color_output = enabled;
        self
    }

    pub fn runtime_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.runtime_home = Some(dir.into());
        self
    }

    pub fn runtime_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.runtime_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn environment(mut self, environment: HashMap<String, String>) -> Self {
        self.config.environment = Some(environment);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = token;
        self
    }

    pub fn progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.config.progress_listeners.push(listener);
        self
    }

    pub fn event_listener(mut self, listener: Arc<dyn OperationEventListener>) -> Self {
        self.config.event_listeners.push(listener);
        self
    }

    /// Run the operation on the calling thread and return its typed result.
    /// Participant failures propagate unchanged.
    pub fn execute_and_wait(&self) -> Result<O::Output, EngineFailure> {
        let key = mapper::connection_key(&self.config);
        let operation = mapper::to_operation(self.operation.kind(), &self.config);
        let connection = self.client.pool.get_or_create(&key)?;
        let outcome = SyncExecutor::run(connection.as_ref(), &operation)?;
        self.operation.decode(outcome)
    }

    /// Run the operation on the client's worker pool. The promise settles
    /// exactly once; its failures are always [`crate::error::ClientError`].
    pub fn execute(&self) -> OperationPromise<O::Output> {
        let key = mapper::connection_key(&self.config);
        let engine_operation = mapper::to_operation(self.operation.kind(), &self.config);
        let cancellation = engine_operation.settings.cancellation.clone();
        let operation = self.operation.clone();
        let client = Arc::clone(&self.client);
        self.client.executor.submit(cancellation, move || {
            let connection = client.pool.get_or_create(&key)?;
            let outcome = SyncExecutor::run(connection.as_ref(), &engine_operation)?;
            operation.decode(outcome)
        })
    }
}

impl Request<ModelFetch> {
    /// Run these tasks before building the model. Leaving this unset is a
    /// different request from setting an empty list: some models reject any
    /// task list at all.
    pub fn for_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operation.tasks = Some(tasks.into_iter().map(Into::into).collect());
        self
    }
}
