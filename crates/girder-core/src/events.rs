use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::OperationId;

/// Free-form progress notification, delivered to plain listeners in the order
/// the participant emits it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub operation_id: OperationId,
    pub description: String,
}

impl ProgressEvent {
    pub fn new(operation_id: OperationId, description: impl Into<String>) -> Self {
        Self {
            operation_id,
            description: description.into(),
        }
    }
}

/// Structured operation lifecycle events, delivered to typed listeners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationEvent {
    #[serde(rename = "operation_started")]
    Started {
        operation_id: OperationId,
        description: String,
        at: DateTime<Utc>,
    },

    #[serde(rename = "status_changed")]
    StatusChanged {
        operation_id: OperationId,
        status: String,
        at: DateTime<Utc>,
    },

    #[serde(rename = "operation_finished")]
    Finished {
        operation_id: OperationId,
        success: bool,
        at: DateTime<Utc>,
    },
}

impl OperationEvent {
    pub fn operation_id(&self) -> &OperationId {
        match self {
            Self::Started { operation_id, .. }
            | Self::StatusChanged { operation_id, .. }
            | Self::Finished { operation_id, .. } => operation_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "operation_started",
            Self::StatusChanged { .. } => "status_changed",
            Self::Finished { .. } => "operation_finished",
        }
    }
}

/// Failure raised by a registered listener while handling a notification.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Plain progress observer.
pub trait ProgressListener: Send + Sync {
    fn status_changed(&self, event: &ProgressEvent) -> Result<(), ListenerError>;
}

/// Typed lifecycle-event observer.
pub trait OperationEventListener: Send + Sync {
    fn on_event(&self, event: &OperationEvent) -> Result<(), ListenerError>;
}
