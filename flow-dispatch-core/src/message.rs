//! Wire messages and lifecycle event types
//!
//! Every phase of an invocation goes out as a pair of events: a specific
//! type (`<TYPE>_STARTING`, `_DONE`, `_FAILED`) and a generic one
//! (`ACTION_STARTING`, `ACTION_DONE`, `ACTION_FAILED`). The message struct
//! serializes to the wire shape other subscribers depend on:
//! `{ type, internal?, id, action?, arguments?, handlers?, error?, ...annotations }`.

use std::sync::{Arc, Mutex, PoisonError};

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::action::{ActionType, Annotations};
use crate::error::ErrorReport;
use crate::id::ActionId;

/// Generic event type fired alongside every specific STARTING event.
pub const ACTION_STARTING: &str = "ACTION_STARTING";
/// Generic event type fired alongside every specific DONE event.
pub const ACTION_DONE: &str = "ACTION_DONE";
/// Generic event type fired alongside every specific FAILED event.
pub const ACTION_FAILED: &str = "ACTION_FAILED";

pub const STARTING_SUFFIX: &str = "_STARTING";
pub const DONE_SUFFIX: &str = "_DONE";
pub const FAILED_SUFFIX: &str = "_FAILED";
/// Suffix used by rollback notifications from the in-memory dispatcher.
pub const ROLLBACK_SUFFIX: &str = "_ROLLBACK";

/// Lifecycle phase, each emitted as a specific/generic event pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecyclePhase {
    Starting,
    Done,
    Failed,
}

impl LifecyclePhase {
    /// The `<TYPE>_STARTING`-style event type for this phase.
    pub fn specific(self, action_type: &ActionType) -> ActionType {
        action_type.with_suffix(self.suffix())
    }

    /// The `ACTION_STARTING`-style event type for this phase.
    pub fn generic(self) -> ActionType {
        ActionType::new(match self {
            Self::Starting => ACTION_STARTING,
            Self::Done => ACTION_DONE,
            Self::Failed => ACTION_FAILED,
        })
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Starting => STARTING_SUFFIX,
            Self::Done => DONE_SUFFIX,
            Self::Failed => FAILED_SUFFIX,
        }
    }
}

/// A handler descriptor recorded while an invocation is in flight.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HandlerEntry {
    /// Name of the store (or other subscriber) that handled the action.
    pub store: String,
    /// Name of the handler that ran.
    pub handler: String,
}

impl HandlerEntry {
    pub fn new(store: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            handler: handler.into(),
        }
    }
}

/// Append-only handler list, shared live with every message that carries it.
///
/// Cloning shares the underlying list: a subscriber holding a STARTING
/// message observes handlers pushed after that message was emitted. Readers
/// wanting a stable view take a [`snapshot`](Self::snapshot) at DONE/FAILED
/// time.
#[derive(Clone, Debug, Default)]
pub struct Handlers(Arc<Mutex<Vec<HandlerEntry>>>);

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: HandlerEntry) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn snapshot(&self) -> Vec<HandlerEntry> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Handlers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let snapshot = self.snapshot();
        let mut seq = serializer.serialize_seq(Some(snapshot.len()))?;
        for entry in &snapshot {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

/// Annotation keys that can never override payload fields when merging.
const RESERVED_FIELDS: [&str; 7] = [
    "type",
    "internal",
    "id",
    "action",
    "arguments",
    "handlers",
    "error",
];

/// A message sent through the dispatch channel.
#[derive(Clone, Debug, Serialize)]
pub struct ActionMessage {
    /// Event type of this message.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Set on lifecycle events and rollback notifications; user dispatches
    /// are not internal.
    #[serde(skip_serializing_if = "is_false")]
    pub internal: bool,
    /// Invocation id shared by every event of the same invocation.
    pub id: ActionId,
    /// Originating action type, carried on generic lifecycle events whose
    /// own `type` field is the generic constant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
    /// Live reference to the invocation's handler list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handlers: Option<Handlers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    /// Annotation fields merged under the payload.
    #[serde(flatten)]
    pub annotations: Annotations,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ActionMessage {
    pub fn new(action_type: impl Into<ActionType>, id: ActionId) -> Self {
        Self {
            action_type: action_type.into(),
            internal: false,
            id,
            action: None,
            arguments: None,
            handlers: None,
            error: None,
            annotations: Annotations::default(),
        }
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn with_action(mut self, action: ActionType) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn with_handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn with_error(mut self, error: ErrorReport) -> Self {
        self.error = Some(error);
        self
    }

    /// Merge annotation fields under the payload. Payload fields win: keys
    /// colliding with reserved wire fields are dropped.
    pub fn merge_annotations(&mut self, annotations: &Annotations) {
        for (key, value) in annotations.iter() {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.annotations.set(key.clone(), value.clone());
        }
    }

    pub fn type_name(&self) -> &str {
        self.action_type.as_str()
    }
}
