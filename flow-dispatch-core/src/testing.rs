//! Test utilities for lifecycle assertions
//!
//! [`RecordingChannel`] stands in for a real dispatcher in tests: it records
//! every message and every rollback in order and offers sequence assertions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flow_dispatch_core::{ActionCreators, ActionOutcome};
//! use flow_dispatch_core::testing::RecordingChannel;
//!
//! let channel = RecordingChannel::new();
//! let mut creators = ActionCreators::new("Demo", Arc::new(channel.clone()));
//! creators.register("ping", |_, _| Ok(ActionOutcome::done()));
//!
//! creators.invoke("ping", vec![]).unwrap();
//! channel.assert_types(&["PING_STARTING", "ACTION_STARTING", "PING_DONE", "ACTION_DONE"]);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::channel::{DispatchChannel, DispatchedAction};
use crate::id::ActionId;
use crate::message::ActionMessage;

/// A dispatch channel that records everything it sees.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    shared: Arc<RecordingShared>,
}

#[derive(Default)]
struct RecordingShared {
    messages: Mutex<Vec<ActionMessage>>,
    rollbacks: Mutex<Vec<ActionId>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, in dispatch order.
    pub fn messages(&self) -> Vec<ActionMessage> {
        self.shared
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return all recorded messages.
    pub fn drain(&self) -> Vec<ActionMessage> {
        std::mem::take(
            &mut *self
                .shared
                .messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// The `type` field of every recorded message, in order.
    pub fn type_names(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m.type_name().to_owned())
            .collect()
    }

    /// Ids whose dispatch handles were rolled back, in order.
    pub fn rollbacks(&self) -> Vec<ActionId> {
        self.shared
            .rollbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First recorded message with the given type.
    pub fn find(&self, type_name: &str) -> Option<ActionMessage> {
        self.messages()
            .into_iter()
            .find(|m| m.type_name() == type_name)
    }

    /// Assert the exact sequence of message types seen so far.
    ///
    /// # Panics
    ///
    /// Panics with both sequences when they differ.
    pub fn assert_types(&self, expected: &[&str]) {
        let actual = self.type_names();
        let expected: Vec<String> = expected.iter().map(|s| (*s).to_owned()).collect();
        assert_eq!(actual, expected, "message sequence mismatch");
    }
}

impl DispatchChannel for RecordingChannel {
    fn dispatch(&self, message: ActionMessage) -> DispatchedAction {
        self.shared
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        let rollbacks = self.shared.clone();
        let rollback_id = message.id.clone();
        let handle = DispatchedAction::new(message.id.clone(), message.action_type.clone(), {
            move || {
                rollbacks
                    .rollbacks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(rollback_id);
            }
        });
        if let Some(handlers) = &message.handlers {
            handle.share_handlers(handlers.clone());
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(action_type: &str) -> ActionMessage {
        ActionMessage::new(action_type, ActionId::generate())
    }

    #[test]
    fn test_records_in_order() {
        let channel = RecordingChannel::new();
        channel.dispatch(message("A"));
        channel.dispatch(message("B"));

        channel.assert_types(&["A", "B"]);
        assert_eq!(channel.drain().len(), 2);
        assert!(channel.messages().is_empty());
    }

    #[test]
    fn test_records_rollbacks() {
        let channel = RecordingChannel::new();
        let keep = channel.dispatch(message("KEEP"));
        let undo = channel.dispatch(message("UNDO"));

        undo.rollback();

        assert_eq!(channel.rollbacks(), vec![undo.id().clone()]);
        assert_ne!(channel.rollbacks()[0], keep.id().clone());
    }

    #[test]
    fn test_find_returns_first_match() {
        let channel = RecordingChannel::new();
        channel.dispatch(message("A"));
        let second = message("B");
        let second_id = second.id.clone();
        channel.dispatch(second);
        channel.dispatch(message("B"));

        assert_eq!(channel.find("B").unwrap().id, second_id);
        assert!(channel.find("C").is_none());
    }
}
