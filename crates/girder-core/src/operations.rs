use serde::{Deserialize, Serialize};

use crate::models::{EngineModel, ModelKind};
use crate::settings::OperationSettings;

/// An opaque action shipped to the engine for in-process execution. The body
/// is collaborator-defined; the client only routes it and its result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub payload: serde_json::Value,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// What a build launch should run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub tasks: Vec<String>,
}

impl LaunchSpec {
    pub fn for_tasks<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }
}

/// Which tests a test launch should run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub classes: Vec<String>,
    pub patterns: Vec<String>,
}

impl TestSpec {
    pub fn for_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            patterns: Vec::new(),
        }
    }
}

/// The four request shapes supported by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationKind {
    /// Fetch a typed model. `tasks` distinguishes "no task list given" from
    /// "run this (possibly empty) task list before building the model"; some
    /// models reject any task list at all, so absence must stay absent.
    FetchModel {
        kind: ModelKind,
        tasks: Option<Vec<String>>,
    },
    RunAction {
        action: ActionDescriptor,
    },
    LaunchBuild {
        spec: LaunchSpec,
    },
    LaunchTests {
        spec: TestSpec,
    },
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchModel { .. } => "model fetch",
            Self::RunAction { .. } => "action execution",
            Self::LaunchBuild { .. } => "build launch",
            Self::LaunchTests { .. } => "test launch",
        }
    }
}

/// A fully configured operation, ready to hand to a participant connection.
#[derive(Clone, Debug)]
pub struct EngineOperation {
    pub kind: OperationKind,
    pub settings: OperationSettings,
}

/// Terminal result of one participant operation. `Completed` is the explicit
/// "finished, no value" outcome for launches, distinct from an operation that
/// has not produced anything yet.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutcome {
    Model(EngineModel),
    ActionValue(serde_json::Value),
    Completed,
}
