use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::events::{
    ListenerError, OperationEvent, OperationEventListener, ProgressEvent, ProgressListener,
};
use crate::ids::OperationId;

/// Stream target shared between the caller and the operation's worker thread.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;
pub type SharedReader = Arc<Mutex<dyn Read + Send>>;

/// Everything a participant needs to run one operation: stream targets,
/// runtime overrides, arguments, the cooperative cancellation token, and the
/// registered listeners. Built once per operation and not mutated afterwards.
#[derive(Clone)]
pub struct OperationSettings {
    pub operation_id: OperationId,
    pub standard_output: Option<SharedWriter>,
    pub standard_error: Option<SharedWriter>,
    pub standard_input: Option<SharedReader>,
    pub color_output: bool,
    pub runtime_home: Option<PathBuf>,
    pub runtime_arguments: Vec<String>,
    pub engine_arguments: Vec<String>,
    pub environment: Option<HashMap<String, String>>,
    pub cancellation: CancellationToken,
    pub progress_listeners: Vec<Arc<dyn ProgressListener>>,
    pub event_listeners: Vec<Arc<dyn OperationEventListener>>,
}

impl OperationSettings {
    pub fn new() -> Self {
        Self {
            operation_id: OperationId::new(),
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

    /// Deliver a plain progress event to every registered plain listener, in
    /// registration order. Stops at the first listener failure.
    pub fn notify_progress(&self, event: &ProgressEvent) -> Result<(), ListenerError> {
        for listener in &self.progress_listeners {
            listener.status_changed(event)?;
        }
        Ok(())
    }

    /// Deliver a typed event to every registered typed listener, in
    /// registration order. Stops at the first listener failure.
    pub fn notify_event(&self, event: &OperationEvent) -> Result<(), ListenerError> {
        for listener in &self.event_listeners {
            listener.on_event(event)?;
        }
        Ok(())
    }
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSettings")
            .field("operation_id", &self.operation_id)
            .field("standard_output", &self.standard_output.is_some())
            .field("standard_error", &self.standard_error.is_some())
            .field("standard_input", &self.standard_input.is_some())
            .field("color_output", &self.color_output)
            .field("runtime_home", &self.runtime_home)
            .field("runtime_arguments", &self.runtime_arguments)
            .field("engine_arguments", &self.engine_arguments)
            .field("environment", &self.environment)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("progress_listeners", &self.progress_listeners.len())
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}
