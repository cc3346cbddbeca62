//! Scriptable fakes for deterministic testing without real engine processes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use girder_core::{
    ConnectionFactory, ConnectionKey, EngineConnection, EngineFailure, EngineModel,
    EngineOperation, OperationOutcome, ProgressEvent, ProjectTree,
};

/// Pre-programmed behavior for one `execute` call.
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Return this outcome.
    Outcome(OperationOutcome),
    /// Fail with this engine-side failure.
    Failure(EngineFailure),
    /// Wait, honoring the operation's cancellation token, then run the inner
    /// behavior.
    Delay(Duration, Box<MockBehavior>),
    /// Emit these plain progress descriptions in order, then run the inner
    /// behavior.
    Progress(Vec<String>, Box<MockBehavior>),
}

impl MockBehavior {
    /// Convenience: return a project hierarchy model.
    pub fn tree(tree: ProjectTree) -> Self {
        Self::Outcome(OperationOutcome::Model(EngineModel::ProjectHierarchy(tree)))
    }

    /// Convenience: finish with no value (launches).
    pub fn completed() -> Self {
        Self::Outcome(OperationOutcome::Completed)
    }

    pub fn delayed(delay: Duration, inner: MockBehavior) -> Self {
        Self::Delay(delay, Box::new(inner))
    }

    pub fn with_progress<I, S>(descriptions: I, inner: MockBehavior) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Progress(
            descriptions.into_iter().map(Into::into).collect(),
            Box::new(inner),
        )
    }
}

/// Mock participant connection. Behaviors are consumed in call order; running
/// out of behaviors is an error so tests notice unexpected extra calls.
pub struct MockConnection {
    behaviors: Mutex<Vec<MockBehavior>>,
    call_count: AtomicUsize,
    executed: Mutex<Vec<EngineOperation>>,
    close_count: AtomicUsize,
    close_failure: Mutex<Option<EngineFailure>>,
}

impl MockConnection {
    pub fn new(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors),
            call_count: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
            close_failure: Mutex::new(None),
        }
    }

    /// A connection whose next model fetch returns the given hierarchy.
    pub fn returning_tree(tree: ProjectTree) -> Self {
        Self::new(vec![MockBehavior::tree(tree)])
    }

    pub fn with_close_failure(self, failure: EngineFailure) -> Self {
        *self.close_failure.lock() = Some(failure);
        self
    }

    pub fn execution_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::Relaxed)
    }

    /// Every operation handed to `execute`, in call order.
    pub fn executed(&self) -> Vec<EngineOperation> {
        self.executed.lock().clone()
    }

    fn run_behavior(
        behavior: MockBehavior,
        operation: &EngineOperation,
    ) -> Result<OperationOutcome, EngineFailure> {
        if operation.settings.cancellation.is_cancelled() {
            return Err(EngineFailure::Cancelled);
        }
        match behavior {
            MockBehavior::Outcome(outcome) => Ok(outcome),
            MockBehavior::Failure(failure) => Err(failure),
            MockBehavior::Delay(delay, inner) => {
                let deadline = Instant::now() + delay;
                // Sleep in slices so cancellation stays cooperative.
                loop {
                    if operation.settings.cancellation.is_cancelled() {
                        return Err(EngineFailure::Cancelled);
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    std::thread::sleep((deadline - now).min(Duration::from_millis(5)));
                }
                Self::run_behavior(*inner, operation)
            }
            MockBehavior::Progress(descriptions, inner) => {
                for description in descriptions {
                    let event =
                        ProgressEvent::new(operation.settings.operation_id.clone(), description);
                    operation.settings.notify_progress(&event)?;
                }
                Self::run_behavior(*inner, operation)
            }
        }
    }
}

impl EngineConnection for MockConnection {
    fn execute(&self, operation: &EngineOperation) -> Result<OperationOutcome, EngineFailure> {
        self.executed.lock().push(operation.clone());
        let index = self.call_count.fetch_add(1, Ordering::Relaxed);
        let behavior = self.behaviors.lock().get(index).cloned().ok_or_else(|| {
            EngineFailure::Other(format!(
                "MockConnection: no behavior configured for call {index}"
            ))
        })?;
        Self::run_behavior(behavior, operation)
    }

    fn close(&self) -> Result<(), EngineFailure> {
        self.close_count.fetch_add(1, Ordering::Relaxed);
        match self.close_failure.lock().clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Mock connection factory. By default every open yields a fresh
/// [`MockConnection`] with no behaviors; scripted connections are handed out
/// first when supplied.
#[derive(Default)]
pub struct MockFactory {
    open_count: AtomicUsize,
    reset_count: AtomicUsize,
    open_delay: Option<Duration>,
    fail_next: Mutex<Option<EngineFailure>>,
    scripted: Mutex<VecDeque<Arc<dyn EngineConnection>>>,
    opened_keys: Mutex<Vec<ConnectionKey>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connections(connections: Vec<Arc<dyn EngineConnection>>) -> Self {
        Self {
            scripted: Mutex::new(connections.into()),
            ..Self::default()
        }
    }

    /// Make every open take this long; used to widen creation races.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Fail the next open with this failure, then behave normally.
    pub fn fail_next_open(self, failure: EngineFailure) -> Self {
        *self.fail_next.lock() = Some(failure);
        self
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    pub fn reset_count(&self) -> usize {
        self.reset_count.load(Ordering::Relaxed)
    }

    pub fn opened_keys(&self) -> Vec<ConnectionKey> {
        self.opened_keys.lock().clone()
    }
}

impl ConnectionFactory for MockFactory {
    fn open(&self, key: &ConnectionKey) -> Result<Arc<dyn EngineConnection>, EngineFailure> {
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
        }
        if let Some(failure) = self.fail_next.lock().take() {
            return Err(failure);
        }
        self.open_count.fetch_add(1, Ordering::Relaxed);
        self.opened_keys.lock().push(key.clone());
        let connection = self
            .scripted
            .lock()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockConnection::new(Vec::new())) as Arc<dyn EngineConnection>);
        Ok(connection)
    }

    fn reset(&self) {
        self.reset_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::{OperationKind, OperationSettings, ProjectNode};

    fn hierarchy_fetch() -> EngineOperation {
        EngineOperation {
            kind: OperationKind::FetchModel {
                kind: girder_core::ModelKind::ProjectHierarchy,
                tasks: None,
            },
            settings: OperationSettings::new(),
        }
    }

    #[test]
    fn behaviors_are_consumed_in_order() {
        let connection = MockConnection::new(vec![
            MockBehavior::completed(),
            MockBehavior::Failure(EngineFailure::BuildFailed("broken".into())),
        ]);
        let operation = hierarchy_fetch();

        assert_eq!(
            connection.execute(&operation),
            Ok(OperationOutcome::Completed)
        );
        assert_eq!(
            connection.execute(&operation),
            Err(EngineFailure::BuildFailed("broken".into()))
        );
        assert!(matches!(
            connection.execute(&operation),
            Err(EngineFailure::Other(_))
        ));
        assert_eq!(connection.execution_count(), 3);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let connection =
            MockConnection::returning_tree(ProjectTree::single(ProjectNode::standalone("a", "a")));
        let operation = hierarchy_fetch();
        operation.settings.cancellation.cancel();

        assert_eq!(
            connection.execute(&operation),
            Err(EngineFailure::Cancelled)
        );
    }

    #[test]
    fn factory_hands_out_scripted_connections_first() {
        let scripted = Arc::new(MockConnection::new(Vec::new()));
        let factory =
            MockFactory::with_connections(vec![Arc::clone(&scripted) as Arc<dyn EngineConnection>]);

        let first = factory.open(&ConnectionKey::new("/a")).unwrap();
        let second = factory.open(&ConnectionKey::new("/b")).unwrap();

        assert!(Arc::ptr_eq(
            &first,
            &(scripted as Arc<dyn EngineConnection>)
        ));
        // Second open falls back to a fresh default connection.
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.open_count(), 2);
        assert_eq!(factory.opened_keys().len(), 2);
    }
}
