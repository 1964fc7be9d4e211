//! Dispatch channel contract and the in-memory dispatcher
//!
//! The engine only ever sees [`DispatchChannel`]: one synchronous dispatch
//! call returning a rollback-capable handle. [`Dispatcher`] is the bundled
//! in-memory implementation used by the demos and tests; external channels
//! are free to implement the trait differently.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::action::ActionType;
use crate::error::ErrorReport;
use crate::id::ActionId;
use crate::message::{ActionMessage, HandlerEntry, Handlers, ROLLBACK_SUFFIX};

/// The external dispatch channel: a single synchronous function from message
/// to handle. The engine never inspects channel internals beyond this.
pub trait DispatchChannel: Send + Sync {
    fn dispatch(&self, message: ActionMessage) -> DispatchedAction;
}

type RollbackFn = Box<dyn FnOnce() + Send>;

/// Handle returned by [`DispatchChannel::dispatch`].
///
/// Cheap to clone; all clones share the rollback capability, the error slot,
/// and the originating invocation's handler list. The rollback operation
/// runs at most once across every clone.
#[derive(Clone)]
pub struct DispatchedAction {
    inner: Arc<DispatchedInner>,
}

struct DispatchedInner {
    id: ActionId,
    action_type: ActionType,
    rollback: Mutex<Option<RollbackFn>>,
    rolled_back: AtomicBool,
    error: Mutex<Option<ErrorReport>>,
    handlers: Mutex<Option<Handlers>>,
}

impl DispatchedAction {
    /// Handle with a rollback operation provided by the channel.
    pub fn new(
        id: ActionId,
        action_type: ActionType,
        rollback: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::assemble(id, action_type, Some(Box::new(rollback)))
    }

    /// Handle with no rollback operation, for channels without undo support.
    pub fn detached(id: ActionId, action_type: ActionType) -> Self {
        Self::assemble(id, action_type, None)
    }

    fn assemble(id: ActionId, action_type: ActionType, rollback: Option<RollbackFn>) -> Self {
        Self {
            inner: Arc::new(DispatchedInner {
                id,
                action_type,
                rollback: Mutex::new(rollback),
                rolled_back: AtomicBool::new(false),
                error: Mutex::new(None),
                handlers: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &ActionId {
        &self.inner.id
    }

    pub fn action_type(&self) -> &ActionType {
        &self.inner.action_type
    }

    /// Share the originating invocation's live handler list with this handle
    /// so sub-handlers can be attached through it.
    pub fn share_handlers(&self, handlers: Handlers) {
        *self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handlers);
    }

    /// Record a sub-handler on the originating invocation's handler list.
    /// No-op when no handler list was shared.
    pub fn add_handler(&self, entry: HandlerEntry) {
        let guard = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handlers) = guard.as_ref() {
            handlers.push(entry);
        }
    }

    /// Undo the effect of the dispatch. Runs at most once; later calls are
    /// no-ops.
    pub fn rollback(&self) {
        let op = self
            .inner
            .rollback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(op) = op {
            self.inner.rolled_back.store(true, Ordering::SeqCst);
            op();
        }
    }

    /// Whether the rollback operation has run.
    pub fn rolled_back(&self) -> bool {
        self.inner.rolled_back.load(Ordering::SeqCst)
    }

    /// Record the serialized error that caused this dispatch to be rolled
    /// back.
    pub fn set_error(&self, report: ErrorReport) {
        *self
            .inner
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub fn error(&self) -> Option<ErrorReport> {
        self.inner
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for DispatchedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchedAction")
            .field("id", &self.inner.id)
            .field("action_type", &self.inner.action_type)
            .field("rolled_back", &self.rolled_back())
            .finish()
    }
}

type Subscriber = Arc<dyn Fn(&ActionMessage) + Send + Sync>;

/// In-memory synchronous dispatch channel.
///
/// Fans every message out to subscribers in registration order before
/// `dispatch` returns. Subscribers may themselves dispatch (the subscriber
/// list is cloned out of the lock before notification). Handles support
/// rollback by re-dispatching an internal `<TYPE>_ROLLBACK` notification
/// carrying the original invocation id, so subscribers can undo.
#[derive(Clone, Default)]
pub struct Dispatcher {
    shared: Arc<DispatcherShared>,
}

#[derive(Default)]
struct DispatcherShared {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl DispatcherShared {
    fn notify(&self, message: &ActionMessage) {
        debug!(
            action_type = message.type_name(),
            id = %message.id,
            internal = message.internal,
            "dispatching"
        );
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in &subscribers {
            subscriber(message);
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are notified synchronously, in
    /// registration order.
    pub fn subscribe(&self, subscriber: impl Fn(&ActionMessage) + Send + Sync + 'static) {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(subscriber));
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl DispatchChannel for Dispatcher {
    fn dispatch(&self, message: ActionMessage) -> DispatchedAction {
        self.shared.notify(&message);

        let shared = self.shared.clone();
        let rollback_type = message.action_type.with_suffix(ROLLBACK_SUFFIX);
        let rollback_id = message.id.clone();
        let handle = DispatchedAction::new(message.id.clone(), message.action_type.clone(), {
            move || {
                let notification = ActionMessage::new(rollback_type, rollback_id).internal();
                shared.notify(&notification);
            }
        });
        if let Some(handlers) = &message.handlers {
            handle.share_handlers(handlers.clone());
        }
        handle
    }
}
