//! The per-invocation lifecycle state machine
//!
//! Every call to a wrapped action runs a fresh machine:
//! STARTING pair → execute → DONE pair, or FAILED pair plus rollback of the
//! invocation's most recent dispatch. Concurrent invocations of the same
//! action never share state; the only shared resource is the channel.
//!
//! Synchronous outcomes settle before the call returns. A deferred outcome
//! returns a [`PendingAction`] immediately and the lifecycle completes on a
//! spawned driver task when the future settles, whether or not the caller
//! awaits. A future that never settles leaves the lifecycle permanently
//! open; there is no cancellation and no timeout at this layer.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::error;

use crate::action::{ActionType, Annotations, Resolved};
use crate::channel::DispatchedAction;
use crate::emitter::LifecycleEmitter;
use crate::error::{ActionError, BoxError, ErrorReport};
use crate::id::{ActionId, InstanceId};
use crate::message::{ActionMessage, Handlers, LifecyclePhase};

/// Settled result of an action function.
pub enum ActionOutcome {
    /// The action finished synchronously with this value.
    Immediate(Value),
    /// The action continues asynchronously; the lifecycle completes when
    /// the future settles.
    Deferred(BoxFuture<'static, Result<Value, BoxError>>),
}

impl ActionOutcome {
    /// Synchronous completion with no value.
    pub fn done() -> Self {
        Self::Immediate(Value::Null)
    }

    /// Synchronous completion with a value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Immediate(value.into())
    }

    /// Deferred completion.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }
}

impl fmt::Debug for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A registered action function: called with the invocation's capability
/// context and the original arguments.
pub type ActionFn =
    Arc<dyn Fn(ActionContext, Vec<Value>) -> Result<ActionOutcome, BoxError> + Send + Sync>;

/// Read-only identity of the owning container, shared with every context.
#[derive(Clone, Debug)]
pub(crate) struct CreatorIdentity {
    pub display_name: Arc<str>,
    pub instance_id: InstanceId,
}

/// State owned by one invocation. Cloning shares the same invocation; a
/// fresh one is built per call, so concurrent calls never interfere.
#[derive(Clone)]
struct InvocationState {
    id: ActionId,
    action_type: ActionType,
    annotations: Annotations,
    handlers: Handlers,
    dispatched: Arc<Mutex<Option<DispatchedAction>>>,
}

impl InvocationState {
    fn new(resolved: Resolved) -> Self {
        Self {
            id: ActionId::generate(),
            action_type: resolved.action_type,
            annotations: resolved.annotations,
            handlers: Handlers::new(),
            dispatched: Arc::new(Mutex::new(None)),
        }
    }

    /// Record a dispatch handle. Later calls overwrite: only the most
    /// recent dispatch is rollback-eligible on failure.
    fn track(&self, handle: DispatchedAction) {
        *self
            .dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn take_dispatched(&self) -> Option<DispatchedAction> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn silent(&self) -> bool {
        self.annotations.is_silent()
    }
}

/// Capability handed to an action function for the duration of one call.
///
/// Carries the read-only container identity and a `dispatch` bound to this
/// invocation; the function receives everything it may touch explicitly.
#[derive(Clone)]
pub struct ActionContext {
    identity: CreatorIdentity,
    invocation: InvocationState,
    emitter: LifecycleEmitter,
}

impl ActionContext {
    /// Send this invocation's own action message through the channel.
    ///
    /// The message carries the invocation id and action type, the live
    /// handler list, and the given arguments, merged with the invocation's
    /// annotations. The returned handle is recorded as the invocation's
    /// rollback candidate; a later `dispatch` replaces it, so only the most
    /// recent handle is rolled back if the invocation fails. The handle is
    /// also returned so the caller can attach sub-handlers.
    pub fn dispatch(&self, arguments: Vec<Value>) -> DispatchedAction {
        let message = ActionMessage::new(
            self.invocation.action_type.clone(),
            self.invocation.id.clone(),
        )
        .with_arguments(arguments)
        .with_handlers(self.invocation.handlers.clone());

        let handle = self.emitter.emit(message, &self.invocation.annotations);
        self.invocation.track(handle.clone());
        handle
    }

    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.identity.instance_id
    }

    pub fn action_id(&self) -> &ActionId {
        &self.invocation.id
    }

    pub fn action_type(&self) -> &ActionType {
        &self.invocation.action_type
    }

    pub fn annotations(&self) -> &Annotations {
        &self.invocation.annotations
    }
}

/// Result of invoking a wrapped action.
#[derive(Debug)]
pub enum InvocationResult {
    /// The action settled synchronously; DONE has already been emitted.
    Completed(Value),
    /// The action returned a deferred outcome; the lifecycle completes when
    /// it settles.
    Pending(PendingAction),
}

impl InvocationResult {
    /// The value of a synchronous completion.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Wait for settlement. Synchronous completions resolve immediately.
    pub async fn settled(self) -> Result<Value, ActionError> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Pending(pending) => pending.settled().await,
        }
    }
}

/// Handle to a deferred invocation.
///
/// The lifecycle completes whether or not this handle is awaited; dropping
/// it merely detaches the caller. Awaiting re-surfaces a deferred failure
/// the way a caller-attached rejection handler would; an unawaited failure
/// is consumed by the lifecycle driver.
#[derive(Debug)]
pub struct PendingAction {
    action_type: ActionType,
    driver: JoinHandle<Result<Value, BoxError>>,
}

impl PendingAction {
    pub fn action_type(&self) -> &ActionType {
        &self.action_type
    }

    pub async fn settled(self) -> Result<Value, ActionError> {
        let Self {
            action_type,
            driver,
        } = self;
        match driver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ActionError::Failed {
                action_type,
                source,
            }),
            Err(_) => Err(ActionError::Interrupted { action_type }),
        }
    }
}

/// Run one full lifecycle for a resolved action.
pub(crate) fn run_action(
    emitter: &LifecycleEmitter,
    identity: &CreatorIdentity,
    method: &str,
    resolved: Resolved,
    func: &ActionFn,
    arguments: Vec<Value>,
) -> Result<InvocationResult, ActionError> {
    let invocation = InvocationState::new(resolved);

    if !invocation.silent() {
        emit_starting(emitter, &invocation);
    }

    let context = ActionContext {
        identity: identity.clone(),
        invocation: invocation.clone(),
        emitter: emitter.clone(),
    };

    match func.as_ref()(context, arguments) {
        Err(err) => {
            complete_failed(emitter, &invocation, identity, method, &err);
            Err(ActionError::Failed {
                action_type: invocation.action_type.clone(),
                source: err,
            })
        }
        Ok(ActionOutcome::Immediate(value)) => {
            complete_done(emitter, &invocation);
            Ok(InvocationResult::Completed(value))
        }
        Ok(ActionOutcome::Deferred(future)) => {
            let action_type = invocation.action_type.clone();
            let emitter = emitter.clone();
            let identity = identity.clone();
            let method = method.to_owned();
            let driver = tokio::spawn(async move {
                match future.await {
                    Ok(value) => {
                        complete_done(&emitter, &invocation);
                        Ok(value)
                    }
                    Err(err) => {
                        complete_failed(&emitter, &invocation, &identity, &method, &err);
                        Err(err)
                    }
                }
            });
            Ok(InvocationResult::Pending(PendingAction {
                action_type,
                driver,
            }))
        }
    }
}

/// Specific STARTING carries `{id}`; the generic event also carries the
/// originating action type and the live handler list.
fn emit_starting(emitter: &LifecycleEmitter, invocation: &InvocationState) {
    let specific = ActionMessage::new(
        LifecyclePhase::Starting.specific(&invocation.action_type),
        invocation.id.clone(),
    )
    .internal();
    emitter.emit(specific, &invocation.annotations);

    let generic = ActionMessage::new(LifecyclePhase::Starting.generic(), invocation.id.clone())
        .internal()
        .with_action(invocation.action_type.clone())
        .with_handlers(invocation.handlers.clone());
    emitter.emit(generic, &invocation.annotations);
}

fn complete_done(emitter: &LifecycleEmitter, invocation: &InvocationState) {
    if invocation.silent() {
        return;
    }
    for event_type in [
        LifecyclePhase::Done.specific(&invocation.action_type),
        LifecyclePhase::Done.generic(),
    ] {
        let message = ActionMessage::new(event_type, invocation.id.clone())
            .internal()
            .with_handlers(invocation.handlers.clone());
        emitter.emit(message, &invocation.annotations);
    }
}

/// FAILED pairs go out even for silent actions.
fn complete_failed(
    emitter: &LifecycleEmitter,
    invocation: &InvocationState,
    identity: &CreatorIdentity,
    method: &str,
    err: &BoxError,
) {
    let report = ErrorReport::from_error(err.as_ref());

    for event_type in [
        LifecyclePhase::Failed.specific(&invocation.action_type),
        LifecyclePhase::Failed.generic(),
    ] {
        let message = ActionMessage::new(event_type, invocation.id.clone())
            .internal()
            .with_error(report.clone())
            .with_handlers(invocation.handlers.clone());
        emitter.emit(message, &invocation.annotations);
    }

    if let Some(dispatched) = invocation.take_dispatched() {
        dispatched.rollback();
        dispatched.set_error(report);
    }

    error!(
        action_type = invocation.action_type.as_str(),
        creator = %identity.display_name,
        instance = %identity.instance_id,
        method,
        error = %err,
        "action failed"
    );
}
