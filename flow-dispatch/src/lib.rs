//! flow-dispatch: action lifecycle dispatch for unidirectional data flow
//!
//! Wraps user-authored action functions so every call becomes a traced,
//! three-phase invocation: a STARTING event pair, the action body, then a
//! DONE or FAILED pair on the shared dispatch channel, with rollback of the
//! invocation's dispatched effect on failure.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use flow_dispatch::prelude::*;
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! let mut creators = ActionCreators::new("TodoActionCreators", Arc::new(dispatcher));
//! creators.register("addTodo", |context, arguments| {
//!     context.dispatch(arguments);
//!     Ok(ActionOutcome::done())
//! });
//!
//! creators.invoke("addTodo", vec![json!("buy milk")]).unwrap();
//! ```

// Re-export everything from core
pub use flow_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use flow_dispatch_core::{
        derive_action_type, ActionContext, ActionCreators, ActionError, ActionId, ActionMessage,
        ActionMetadata, ActionOutcome, ActionType, Annotations, BoxError, DispatchChannel,
        DispatchedAction, Dispatcher, ErrorReport, HandlerEntry, Handlers, InstanceId,
        InvocationResult, LifecycleLogger, LifecyclePhase, LoggerConfig, PendingAction, TypeMap,
        ACTION_DONE, ACTION_FAILED, ACTION_STARTING,
    };
}
