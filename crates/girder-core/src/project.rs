use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of one project within a build, as reported by the engine.
/// Two projects are the same logical project iff their identities are equal.
#[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectIdentity(String);

impl ProjectIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectIdentity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One node of a participant's project hierarchy. Parent and children are
/// identity references into the owning [`ProjectTree`], not owned edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub id: ProjectIdentity,
    pub name: String,
    pub parent: Option<ProjectIdentity>,
    pub children: Vec<ProjectIdentity>,
}

impl ProjectNode {
    pub fn new(
        id: impl Into<ProjectIdentity>,
        name: impl Into<String>,
        parent: Option<ProjectIdentity>,
        children: impl IntoIterator<Item = ProjectIdentity>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent,
            children: children.into_iter().collect(),
        }
    }

    /// A node with no parent and no children.
    pub fn standalone(id: impl Into<ProjectIdentity>, name: impl Into<String>) -> Self {
        Self::new(id, name, None, [])
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("project '{0}' is not part of the hierarchy")]
    MissingNode(ProjectIdentity),

    #[error("parent chain of project '{0}' does not terminate")]
    ParentCycle(ProjectIdentity),
}

/// A participant's hierarchical result: an owned arena of nodes addressed by
/// identity. `entry` is the node the engine handed back, which is not
/// necessarily the root of the hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectTree {
    entry: ProjectIdentity,
    nodes: HashMap<ProjectIdentity, ProjectNode>,
}

impl ProjectTree {
    pub fn new(
        entry: impl Into<ProjectIdentity>,
        nodes: impl IntoIterator<Item = ProjectNode>,
    ) -> Result<Self, TreeError> {
        let entry = entry.into();
        let nodes: HashMap<ProjectIdentity, ProjectNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        if !nodes.contains_key(&entry) {
            return Err(TreeError::MissingNode(entry));
        }
        Ok(Self { entry, nodes })
    }

    /// A tree consisting of a single standalone node.
    pub fn single(node: ProjectNode) -> Self {
        let entry = node.id.clone();
        let nodes = HashMap::from([(entry.clone(), node)]);
        Self { entry, nodes }
    }

    pub fn entry(&self) -> &ProjectNode {
        // Entry presence is validated on construction.
        &self.nodes[&self.entry]
    }

    pub fn get(&self, id: &ProjectIdentity) -> Option<&ProjectNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk parent references upward from `id` until a node with no parent is
    /// found. The walk is bounded by the arena size, so a corrupt parent chain
    /// is reported instead of looping.
    pub fn root_from(&self, id: &ProjectIdentity) -> Result<&ProjectNode, TreeError> {
        let mut current = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::MissingNode(id.clone()))?;
        let mut hops = 0usize;
        while let Some(parent_id) = &current.parent {
            hops += 1;
            if hops > self.nodes.len() {
                return Err(TreeError::ParentCycle(id.clone()));
            }
            current = self
                .nodes
                .get(parent_id)
                .ok_or_else(|| TreeError::MissingNode(parent_id.clone()))?;
        }
        Ok(current)
    }

    /// The true root reachable from the entry node.
    pub fn root(&self) -> Result<&ProjectNode, TreeError> {
        self.root_from(&self.entry)
    }

    /// All nodes reachable below `id`, excluding `id` itself. Children are
    /// visited depth-first over the arena; a dangling child reference is an
    /// error.
    pub fn descendants_of(&self, id: &ProjectIdentity) -> Result<Vec<&ProjectNode>, TreeError> {
        let start = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::MissingNode(id.clone()))?;
        let mut out = Vec::new();
        let mut stack: Vec<&ProjectIdentity> = start.children.iter().rev().collect();
        while let Some(child_id) = stack.pop() {
            let child = self
                .nodes
                .get(child_id)
                .ok_or_else(|| TreeError::MissingNode(child_id.clone()))?;
            out.push(child);
            stack.extend(child.children.iter().rev());
        }
        Ok(out)
    }
}

/// The deduplicated, flattened aggregate of projects collected across all
/// participants of a composite request. Unique by project identity; no
/// iteration order is guaranteed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeWorkspace {
    projects: HashMap<ProjectIdentity, ProjectNode>,
}

impl CompositeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a project, collapsing entries with equal identity to one
    /// representative. Returns false if the identity was already present.
    pub fn insert(&mut self, node: ProjectNode) -> bool {
        match self.projects.entry(node.id.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    pub fn contains(&self, id: &ProjectIdentity) -> bool {
        self.projects.contains_key(id)
    }

    pub fn get(&self, id: &ProjectIdentity) -> Option<&ProjectNode> {
        self.projects.get(id)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectNode> {
        self.projects.values()
    }

    /// Identities in sorted order, for stable display and assertions.
    pub fn identities(&self) -> Vec<&ProjectIdentity> {
        let mut ids: Vec<&ProjectIdentity> = self.projects.keys().collect();
        ids.sort();
        ids
    }
}
