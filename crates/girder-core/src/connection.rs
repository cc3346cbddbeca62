use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::EngineFailure;
use crate::operations::{EngineOperation, OperationOutcome};

/// Which engine distribution a connection should run against.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Distribution {
    /// Whatever the connected build defines (wrapper or bundled default).
    #[default]
    Default,
    /// A local installation directory.
    Installation { dir: PathBuf },
    /// A specific released version, resolved by the connection factory.
    Version { version: String },
}

/// Identity of a pooled connection. Two keys are equal iff all three
/// components are equal; the key is only ever used for pool lookups.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub project_dir: PathBuf,
    pub engine_user_home: Option<PathBuf>,
    pub distribution: Distribution,
}

impl ConnectionKey {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            engine_user_home: None,
            distribution: Distribution::Default,
        }
    }
}

/// One open connection to a build engine process ("participant"). Running an
/// operation is an opaque synchronous call: it blocks until the engine is
/// done and either returns the outcome or a typed failure. Implementations
/// must be safe to share across threads.
pub trait EngineConnection: Send + Sync {
    fn execute(&self, operation: &EngineOperation) -> Result<OperationOutcome, EngineFailure>;

    /// Release the underlying engine resources.
    fn close(&self) -> Result<(), EngineFailure>;
}

/// Opens connections for the pool. `reset` drops whatever engine
/// implementations the factory has cached so the next open rediscovers them;
/// the pool calls it at the end of a graceful shutdown.
pub trait ConnectionFactory: Send + Sync {
    fn open(&self, key: &ConnectionKey) -> Result<Arc<dyn EngineConnection>, EngineFailure>;

    fn reset(&self) {}
}
