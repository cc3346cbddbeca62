pub mod connection;
pub mod errors;
pub mod events;
pub mod ids;
pub mod models;
pub mod operations;
pub mod project;
pub mod settings;

pub use connection::{ConnectionFactory, ConnectionKey, Distribution, EngineConnection};
pub use errors::EngineFailure;
pub use events::{ListenerError, OperationEvent, OperationEventListener, ProgressEvent, ProgressListener};
pub use ids::OperationId;
pub use models::{BuildEnvironment, EngineModel, ModelKind};
pub use operations::{
    ActionDescriptor, EngineOperation, LaunchSpec, OperationKind, OperationOutcome, TestSpec,
};
pub use project::{CompositeWorkspace, ProjectIdentity, ProjectNode, ProjectTree, TreeError};
pub use settings::{OperationSettings, SharedReader, SharedWriter};
