//! Adapter that turns lifecycle events into channel messages

use std::sync::Arc;

use crate::action::Annotations;
use crate::channel::{DispatchChannel, DispatchedAction};
use crate::message::ActionMessage;

/// Sends lifecycle events through the dispatch channel.
///
/// Annotations are merged under the payload (payload fields win) and the
/// message goes out exactly once, synchronously, before `emit` returns.
/// No retrying, no buffering: a panicking channel propagates to the caller.
#[derive(Clone)]
pub struct LifecycleEmitter {
    channel: Arc<dyn DispatchChannel>,
}

impl LifecycleEmitter {
    pub fn new(channel: Arc<dyn DispatchChannel>) -> Self {
        Self { channel }
    }

    pub fn emit(
        &self,
        mut message: ActionMessage,
        annotations: &Annotations,
    ) -> DispatchedAction {
        message.merge_annotations(annotations);
        self.channel.dispatch(message)
    }

    pub fn channel(&self) -> &Arc<dyn DispatchChannel> {
        &self.channel
    }
}
