use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use girder_core::{
    CompositeWorkspace, EngineConnection, EngineFailure, EngineModel, EngineOperation, ModelKind,
    OperationKind, OperationOutcome, OperationSettings, ProjectNode, ProjectTree,
};

use crate::adapter::{adapt_failure, ResultHandler, ResultHandlerAdapter};
use crate::error::ClientError;
use crate::executor::SyncExecutor;
use crate::promise::OperationPromise;

/// Collects participant connections for one composite build.
pub struct CompositeBuilder {
    handle: Handle,
    participants: Vec<Arc<dyn EngineConnection>>,
}

impl CompositeBuilder {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            participants: Vec::new(),
        }
    }

    /// Add a participating connection. The participant can be a single- or
    /// multi-project build.
    pub fn with_participant(mut self, participant: Arc<dyn EngineConnection>) -> Self {
        self.participants.push(participant);
        self
    }

    pub fn build(self) -> CompositeBuild {
        CompositeBuild {
            handle: self.handle,
            participants: self.participants,
        }
    }
}

/// A set of participant builds whose project hierarchies aggregate into one
/// workspace-level model. The aggregate is recomputed fresh on every request.
pub struct CompositeBuild {
    handle: Handle,
    participants: Vec<Arc<dyn EngineConnection>>,
}

impl CompositeBuild {
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Fetch and aggregate, blocking the calling thread.
    pub fn get_model(&self, kind: ModelKind) -> Result<CompositeWorkspace, ClientError> {
        self.get_model_async(kind)?.wait()
    }

    /// Fetch and aggregate on the worker pool. Fails fast, before any
    /// participant is contacted, if `kind` is not the composite workspace
    /// model.
    pub fn get_model_async(
        &self,
        kind: ModelKind,
    ) -> Result<OperationPromise<CompositeWorkspace>, ClientError> {
        ensure_supported(kind)?;
        let cancellation = CancellationToken::new();
        let (promise, completer) = OperationPromise::pending(cancellation.clone());
        let handle = self.handle.clone();
        let participants = self.participants.clone();
        self.handle.spawn(async move {
            let result = aggregate(handle, participants, cancellation).await;
            completer.complete(result.map_err(adapt_failure));
        });
        Ok(promise)
    }

    /// Callback variant: the handler observes either the aggregate or a
    /// taxonomy failure. Same fail-fast model kind check as the other paths.
    pub fn get_model_with<H>(&self, kind: ModelKind, handler: H) -> Result<(), ClientError>
    where
        H: ResultHandler<CompositeWorkspace> + 'static,
    {
        ensure_supported(kind)?;
        let cancellation = CancellationToken::new();
        let handle = self.handle.clone();
        let participants = self.participants.clone();
        self.handle.spawn(async move {
            let result = aggregate(handle, participants, cancellation).await;
            ResultHandlerAdapter::new(handler).deliver(result);
        });
        Ok(())
    }
}

fn ensure_supported(kind: ModelKind) -> Result<(), ClientError> {
    if kind == ModelKind::CompositeWorkspace {
        Ok(())
    } else {
        Err(ClientError::UnsupportedModel(format!(
            "the only model a composite can aggregate is composite_workspace, got {kind}"
        )))
    }
}

/// Fetch every participant's hierarchy concurrently and merge the
/// contributions. The merge is an identity-keyed union, so participant order
/// cannot affect the result.
async fn aggregate(
    handle: Handle,
    participants: Vec<Arc<dyn EngineConnection>>,
    cancellation: CancellationToken,
) -> Result<CompositeWorkspace, EngineFailure> {
    let tasks: Vec<_> = participants
        .into_iter()
        .map(|participant| {
            let cancellation = cancellation.clone();
            handle.spawn_blocking(move || fetch_contribution(participant.as_ref(), cancellation))
        })
        .collect();

    let mut contributions = Vec::new();
    for joined in futures::future::join_all(tasks).await {
        let contribution = joined
            .map_err(|e| EngineFailure::Other(format!("participant fetch task failed: {e}")))??;
        contributions.extend(contribution);
    }
    let workspace = deduplicate(contributions);
    debug!(projects = workspace.len(), "composite aggregation finished");
    Ok(workspace)
}

/// One participant's contribution to the composite.
fn fetch_contribution(
    participant: &dyn EngineConnection,
    cancellation: CancellationToken,
) -> Result<Vec<ProjectNode>, EngineFailure> {
    let mut settings = OperationSettings::new();
    settings.cancellation = cancellation;
    let operation = EngineOperation {
        kind: OperationKind::FetchModel {
            kind: ModelKind::ProjectHierarchy,
            tasks: None,
        },
        settings,
    };
    let outcome = SyncExecutor::run(participant, &operation)?;
    let tree = match outcome {
        OperationOutcome::Model(EngineModel::ProjectHierarchy(tree)) => tree,
        other => {
            return Err(EngineFailure::Protocol(format!(
                "expected a project hierarchy from participant, got {other:?}"
            )))
        }
    };
    contribution_of(&tree)
}

/// The nodes a participant adds to the workspace: the non-root descendants
/// of its true root, or the root itself when it has no children. Leaf-only
/// participants still contribute their single node; multi-node participants
/// never contribute the root. The participant may have handed back a
/// non-root node, so the root is found by walking parent references first.
fn contribution_of(tree: &ProjectTree) -> Result<Vec<ProjectNode>, EngineFailure> {
    let root = tree
        .root()
        .map_err(|e| EngineFailure::Protocol(e.to_string()))?;
    if root.children.is_empty() {
        Ok(vec![root.clone()])
    } else {
        let descendants = tree
            .descendants_of(&root.id)
            .map_err(|e| EngineFailure::Protocol(e.to_string()))?;
        Ok(descendants.into_iter().cloned().collect())
    }
}

/// Collapse entries representing the same logical project into one. Inserting
/// into the identity-keyed workspace is idempotent, so running this twice or
/// reordering the input cannot change the result.
fn deduplicate(nodes: impl IntoIterator<Item = ProjectNode>) -> CompositeWorkspace {
    let mut workspace = CompositeWorkspace::new();
    for node in nodes {
        workspace.insert(node);
    }
    workspace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBehavior, MockConnection};
    use girder_core::ProjectIdentity;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn standalone(id: &str) -> ProjectTree {
        ProjectTree::single(ProjectNode::standalone(id, id))
    }

    fn parent_with_children(root: &str, children: &[&str]) -> ProjectTree {
        let mut nodes = vec![ProjectNode::new(
            root,
            root,
            None,
            children.iter().map(|c| ProjectIdentity::new(*c)),
        )];
        for child in children {
            nodes.push(ProjectNode::new(
                *child,
                *child,
                Some(ProjectIdentity::new(root)),
                [],
            ));
        }
        ProjectTree::new(root, nodes).unwrap()
    }

    fn ids(workspace: &CompositeWorkspace) -> Vec<&str> {
        workspace.identities().iter().map(|i| i.as_str()).collect()
    }

    #[test]
    fn two_leaf_participants_contribute_both_roots() {
        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::new(MockConnection::returning_tree(standalone("a"))))
            .with_participant(Arc::new(MockConnection::returning_tree(standalone("b"))))
            .build();

        let workspace = composite.get_model(ModelKind::CompositeWorkspace).unwrap();
        assert_eq!(ids(&workspace), vec!["a", "b"]);
    }

    #[test]
    fn overlapping_participants_deduplicate_and_exclude_root() {
        // Participant 1: root R with children C1, C2. Participant 2: C1 alone.
        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::new(MockConnection::returning_tree(
                parent_with_children("r", &["c1", "c2"]),
            )))
            .with_participant(Arc::new(MockConnection::returning_tree(standalone("c1"))))
            .build();

        let workspace = composite.get_model(ModelKind::CompositeWorkspace).unwrap();
        assert_eq!(ids(&workspace), vec!["c1", "c2"]);
        assert!(!workspace.contains(&ProjectIdentity::new("r")));
    }

    #[test]
    fn unsupported_model_fails_before_contacting_participants() {
        let runtime = runtime();
        let first = Arc::new(MockConnection::returning_tree(standalone("a")));
        let second = Arc::new(MockConnection::returning_tree(standalone("b")));
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::clone(&first) as Arc<dyn EngineConnection>)
            .with_participant(Arc::clone(&second) as Arc<dyn EngineConnection>)
            .build();

        let err = composite.get_model(ModelKind::ProjectHierarchy).unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedModel(_)));
        assert_eq!(first.execution_count(), 0);
        assert_eq!(second.execution_count(), 0);
    }

    #[test]
    fn entry_node_deep_below_root_is_normalized() {
        // r -> c1 -> c2 -> c3, participant hands back c3.
        let tree = ProjectTree::new(
            "c3",
            [
                ProjectNode::new("r", "r", None, [ProjectIdentity::new("c1")]),
                ProjectNode::new(
                    "c1",
                    "c1",
                    Some(ProjectIdentity::new("r")),
                    [ProjectIdentity::new("c2")],
                ),
                ProjectNode::new(
                    "c2",
                    "c2",
                    Some(ProjectIdentity::new("c1")),
                    [ProjectIdentity::new("c3")],
                ),
                ProjectNode::new("c3", "c3", Some(ProjectIdentity::new("c2")), []),
            ],
        )
        .unwrap();

        let contribution = contribution_of(&tree).unwrap();
        let mut contributed: Vec<&str> = contribution.iter().map(|n| n.id.as_str()).collect();
        contributed.sort_unstable();
        assert_eq!(contributed, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn childless_root_contributes_itself() {
        let contribution = contribution_of(&standalone("solo")).unwrap();
        assert_eq!(contribution.len(), 1);
        assert_eq!(contribution[0].id, ProjectIdentity::new("solo"));
    }

    #[test]
    fn deduplication_is_idempotent_and_order_independent() {
        let nodes = vec![
            ProjectNode::standalone("a", "a"),
            ProjectNode::standalone("b", "b"),
            ProjectNode::standalone("a", "a"),
            ProjectNode::standalone("c", "c"),
        ];

        let once = deduplicate(nodes.clone());
        let twice = deduplicate(once.projects().cloned().collect::<Vec<_>>());
        assert_eq!(ids(&once), ids(&twice));

        let mut reversed = nodes;
        reversed.reverse();
        let reordered = deduplicate(reversed);
        assert_eq!(ids(&once), ids(&reordered));
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn participant_failure_reaches_caller_adapted() {
        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::new(MockConnection::new(vec![MockBehavior::Failure(
                EngineFailure::ConnectionBroken("daemon died".into()),
            )])))
            .build();

        let err = composite.get_model(ModelKind::CompositeWorkspace).unwrap_err();
        assert_eq!(err, ClientError::ConnectionFailure("daemon died".into()));
    }

    #[test]
    fn cancellation_settles_the_promise_with_cancelled() {
        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::new(MockConnection::new(vec![MockBehavior::delayed(
                Duration::from_secs(5),
                MockBehavior::tree(standalone("slow")),
            )])))
            .build();

        let promise = composite.get_model_async(ModelKind::CompositeWorkspace).unwrap();
        promise.cancel();
        assert_eq!(promise.wait(), Err(ClientError::OperationCancelled));
    }

    #[test]
    fn handler_variant_delivers_the_aggregate() {
        struct Collecting {
            results: Mutex<Vec<Result<CompositeWorkspace, ClientError>>>,
        }
        impl ResultHandler<CompositeWorkspace> for Arc<Collecting> {
            fn on_complete(&self, value: CompositeWorkspace) {
                self.results.lock().push(Ok(value));
            }
            fn on_failure(&self, failure: ClientError) {
                self.results.lock().push(Err(failure));
            }
        }

        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone())
            .with_participant(Arc::new(MockConnection::returning_tree(standalone("a"))))
            .build();

        let handler = Arc::new(Collecting {
            results: Mutex::new(Vec::new()),
        });
        composite
            .get_model_with(ModelKind::CompositeWorkspace, Arc::clone(&handler))
            .unwrap();

        // Wait for the background aggregation to deliver.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while handler.results.lock().is_empty() {
            assert!(std::time::Instant::now() < deadline, "handler never called");
            std::thread::sleep(Duration::from_millis(5));
        }

        let results = handler.results.lock();
        assert_eq!(results.len(), 1);
        let workspace = results[0].as_ref().unwrap();
        assert!(workspace.contains(&ProjectIdentity::new("a")));
    }

    #[test]
    fn handler_variant_rejects_unsupported_kind_without_spawning() {
        struct Panicking;
        impl ResultHandler<CompositeWorkspace> for Panicking {
            fn on_complete(&self, _value: CompositeWorkspace) {
                panic!("must not be called");
            }
            fn on_failure(&self, _failure: ClientError) {
                panic!("must not be called");
            }
        }

        let runtime = runtime();
        let composite = CompositeBuilder::new(runtime.handle().clone()).build();
        let err = composite
            .get_model_with(ModelKind::BuildEnvironment, Panicking)
            .unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedModel(_)));
    }
}
