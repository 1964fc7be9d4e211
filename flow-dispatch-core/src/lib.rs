//! Core traits and types for flow-dispatch
//!
//! This crate provides the action-dispatch lifecycle engine underlying a
//! unidirectional-data-flow architecture: user-authored action functions are
//! wrapped so that every invocation emits a deterministic sequence of
//! lifecycle events onto a shared dispatch channel, with rollback of
//! partially-applied effects on failure.
//!
//! # Core Concepts
//!
//! - **ActionCreators**: a named container of wrapped action methods
//! - **Lifecycle events**: each invocation emits STARTING, then DONE or
//!   FAILED, always as a specific + generic event pair
//! - **DispatchChannel**: the synchronous message bus events go through
//! - **DispatchedAction**: the rollback-capable handle a dispatch returns
//! - **Annotations**: per-action metadata (e.g. `silent`) controlling the
//!   wrapper
//!
//! # Basic Example
//!
//! ```
//! use std::sync::Arc;
//! use flow_dispatch_core::prelude::*;
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.subscribe(|message| {
//!     println!("{} {}", message.type_name(), message.id);
//! });
//!
//! let mut creators = ActionCreators::new("CounterActionCreators", Arc::new(dispatcher));
//! creators.register("increment", |context, arguments| {
//!     context.dispatch(arguments);
//!     Ok(ActionOutcome::done())
//! });
//!
//! // Emits, in order: INCREMENT_STARTING, ACTION_STARTING, INCREMENT,
//! // INCREMENT_DONE, ACTION_DONE.
//! creators.invoke("increment", vec![json!(5)]).unwrap();
//! ```
//!
//! # Deferred Actions
//!
//! An action that needs async work returns [`ActionOutcome::deferred`]; the
//! call returns immediately with a pending handle and the DONE/FAILED pair
//! fires when the future settles:
//!
//! ```ignore
//! creators.register("loadUser", |context, arguments| {
//!     let context = context.clone();
//!     Ok(ActionOutcome::deferred(async move {
//!         let user = api::fetch_user(&arguments).await?;
//!         context.dispatch(vec![user.clone()]);
//!         Ok(user)
//!     }))
//! });
//!
//! let result = creators.invoke("loadUser", vec![json!(1)])?;
//! let user = result.settled().await?;
//! ```

pub mod action;
pub mod channel;
pub mod creators;
pub mod emitter;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod logger;
pub mod message;
pub mod testing;

// Action type and resolution exports
pub use action::{
    derive_action_type, resolve, ActionMetadata, ActionType, Annotations, Resolved, TypeMap,
};

// Channel exports
pub use channel::{DispatchChannel, DispatchedAction, Dispatcher};

// Container exports
pub use creators::ActionCreators;

// Emitter exports
pub use emitter::LifecycleEmitter;

// Error exports
pub use error::{ActionError, BoxError, ErrorReport};

// Id exports
pub use id::{ActionId, InstanceId};

// Lifecycle exports
pub use lifecycle::{ActionContext, ActionFn, ActionOutcome, InvocationResult, PendingAction};

// Logger exports
pub use logger::{glob_match, LifecycleLogger, LoggerConfig};

// Message exports
pub use message::{
    ActionMessage, HandlerEntry, Handlers, LifecyclePhase, ACTION_DONE, ACTION_FAILED,
    ACTION_STARTING,
};

// Testing exports
pub use testing::RecordingChannel;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{
        derive_action_type, ActionMetadata, ActionType, Annotations, TypeMap,
    };
    pub use crate::channel::{DispatchChannel, DispatchedAction, Dispatcher};
    pub use crate::creators::ActionCreators;
    pub use crate::error::{ActionError, BoxError, ErrorReport};
    pub use crate::id::{ActionId, InstanceId};
    pub use crate::lifecycle::{
        ActionContext, ActionOutcome, InvocationResult, PendingAction,
    };
    pub use crate::logger::{LifecycleLogger, LoggerConfig};
    pub use crate::message::{
        ActionMessage, HandlerEntry, Handlers, LifecyclePhase, ACTION_DONE, ACTION_FAILED,
        ACTION_STARTING,
    };
}
