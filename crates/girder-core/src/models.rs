use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::project::ProjectTree;

/// The model shapes a caller can request.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// The project hierarchy of a single build.
    ProjectHierarchy,
    /// Engine version and runtime information for a single build.
    BuildEnvironment,
    /// The aggregated workspace across composite participants. Only valid on
    /// the composite entry point.
    CompositeWorkspace,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectHierarchy => "project_hierarchy",
            Self::BuildEnvironment => "build_environment",
            Self::CompositeWorkspace => "composite_workspace",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine and runtime details for one build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub engine_version: String,
    pub runtime_home: Option<PathBuf>,
}

/// A model payload returned by a single participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum EngineModel {
    ProjectHierarchy(ProjectTree),
    BuildEnvironment(BuildEnvironment),
}

impl EngineModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::ProjectHierarchy(_) => ModelKind::ProjectHierarchy,
            Self::BuildEnvironment(_) => ModelKind::BuildEnvironment,
        }
    }
}
