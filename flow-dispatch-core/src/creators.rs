//! Action-creator containers
//!
//! Groups related wrapped actions behind one dispatch channel, supplies each
//! call's capability context, and supports declarative type registration:
//! type-map entries without a registered method become dispatch-only actions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::action::{
    self, derive_action_type, ActionMetadata, ActionType, Annotations, Resolved, TypeMap,
};
use crate::channel::DispatchChannel;
use crate::emitter::LifecycleEmitter;
use crate::error::{ActionError, BoxError};
use crate::id::InstanceId;
use crate::lifecycle::{
    run_action, ActionContext, ActionFn, ActionOutcome, CreatorIdentity, InvocationResult,
};

struct RegisteredAction {
    func: ActionFn,
    metadata: Option<ActionMetadata>,
    /// Set for methods auto-generated from a type map; skips resolution.
    fixed_type: Option<ActionType>,
}

/// A named collection of wrapped action methods.
///
/// Every invocation runs a fresh lifecycle machine (see the crate docs for
/// the event sequence contract). The container itself holds no per-call
/// state: concurrent invocations of the same method are independent.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use flow_dispatch_core::{ActionCreators, ActionOutcome, Dispatcher};
/// use serde_json::json;
///
/// let dispatcher = Dispatcher::new();
/// let mut creators = ActionCreators::new("CounterActionCreators", Arc::new(dispatcher));
/// creators.register("increment", |context, arguments| {
///     context.dispatch(arguments);
///     Ok(ActionOutcome::done())
/// });
///
/// creators.invoke("increment", vec![json!(5)]).unwrap();
/// ```
pub struct ActionCreators {
    identity: CreatorIdentity,
    emitter: LifecycleEmitter,
    types: TypeMap,
    methods: HashMap<String, RegisteredAction>,
}

impl ActionCreators {
    /// Create an empty container. The instance id is derived from the
    /// display name.
    pub fn new(display_name: impl Into<String>, channel: Arc<dyn DispatchChannel>) -> Self {
        let name = display_name.into();
        let display_name: Arc<str> = name.into();
        let instance_id = InstanceId::generate(&display_name);
        Self {
            identity: CreatorIdentity {
                display_name,
                instance_id,
            },
            emitter: LifecycleEmitter::new(channel),
            types: TypeMap::default(),
            methods: HashMap::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.identity.instance_id
    }

    /// Register an action method. Replaces any method with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(ActionContext, Vec<Value>) -> Result<ActionOutcome, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name.into(), Arc::new(func), None, None);
        self
    }

    /// Register an action method carrying authored metadata. The metadata's
    /// type wins over the declared type map and the naming transform;
    /// metadata without a type fails at the first invocation.
    pub fn register_with<F>(
        &mut self,
        name: impl Into<String>,
        metadata: ActionMetadata,
        func: F,
    ) -> &mut Self
    where
        F: Fn(ActionContext, Vec<Value>) -> Result<ActionOutcome, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name.into(), Arc::new(func), Some(metadata), None);
        self
    }

    fn insert(
        &mut self,
        name: String,
        func: ActionFn,
        metadata: Option<ActionMetadata>,
        fixed_type: Option<ActionType>,
    ) {
        if self.methods.contains_key(&name) {
            warn!(
                creator = %self.identity.display_name,
                method = name.as_str(),
                "replacing a registered action"
            );
        }
        self.methods.insert(
            name,
            RegisteredAction {
                func,
                metadata,
                fixed_type,
            },
        );
    }

    /// Assign the declared type map.
    ///
    /// Every entry whose key has no registered method gets a dispatch-only
    /// method: it forwards all arguments to `dispatch` and completes
    /// immediately, going through the full lifecycle with the declared
    /// type. Methods that already exist are left untouched.
    pub fn assign_types(&mut self, types: TypeMap) {
        for (method, action_type) in types.iter() {
            if self.methods.contains_key(method) {
                continue;
            }
            let func: ActionFn = Arc::new(|context, arguments| {
                context.dispatch(arguments);
                Ok(ActionOutcome::done())
            });
            self.insert(method.clone(), func, None, Some(action_type.clone()));
        }
        self.types = types;
    }

    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Invoke a registered action by name.
    pub fn invoke(
        &self,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<InvocationResult, ActionError> {
        let registered = self
            .methods
            .get(name)
            .ok_or_else(|| ActionError::UnknownAction {
                method: name.to_owned(),
            })?;

        let resolved = match &registered.fixed_type {
            Some(action_type) => Resolved {
                action_type: action_type.clone(),
                annotations: Annotations::default(),
            },
            None => action::resolve(
                registered.metadata.as_ref(),
                name,
                &self.types,
                derive_action_type,
            )?,
        };

        run_action(
            &self.emitter,
            &self.identity,
            name,
            resolved,
            &registered.func,
            arguments,
        )
    }

    /// The naming transform used when no explicit type is declared.
    pub fn derive_type(name: &str) -> ActionType {
        derive_action_type(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingChannel;
    use serde_json::json;

    fn harness(name: &str) -> (RecordingChannel, ActionCreators) {
        let channel = RecordingChannel::new();
        let creators = ActionCreators::new(name, Arc::new(channel.clone()));
        (channel, creators)
    }

    #[test]
    fn test_method_name_becomes_derived_type() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register("loadUserProfile", |context, arguments| {
            context.dispatch(arguments);
            Ok(ActionOutcome::done())
        });

        creators.invoke("loadUserProfile", vec![json!(42)]).unwrap();

        channel.assert_types(&[
            "LOAD_USER_PROFILE_STARTING",
            "ACTION_STARTING",
            "LOAD_USER_PROFILE",
            "LOAD_USER_PROFILE_DONE",
            "ACTION_DONE",
        ]);
    }

    #[test]
    fn test_declared_type_map_overrides_derivation() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register("save", |context, arguments| {
            context.dispatch(arguments);
            Ok(ActionOutcome::done())
        });
        creators.assign_types(TypeMap::new().with("save", "PERSIST"));

        creators.invoke("save", vec![]).unwrap();

        channel.assert_types(&[
            "PERSIST_STARTING",
            "ACTION_STARTING",
            "PERSIST",
            "PERSIST_DONE",
            "ACTION_DONE",
        ]);
    }

    #[test]
    fn test_metadata_type_wins_over_everything() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register_with(
            "save",
            ActionMetadata::typed("CUSTOM_SAVE"),
            |context, arguments| {
                context.dispatch(arguments);
                Ok(ActionOutcome::done())
            },
        );
        creators.assign_types(TypeMap::new().with("save", "PERSIST"));

        creators.invoke("save", vec![]).unwrap();

        assert_eq!(channel.type_names()[0], "CUSTOM_SAVE_STARTING");
    }

    #[test]
    fn test_metadata_without_type_fails_at_first_invocation() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register_with("save", ActionMetadata::untyped().silent(), |_, _| {
            Ok(ActionOutcome::done())
        });

        let err = creators.invoke("save", vec![]).unwrap_err();
        assert!(matches!(err, ActionError::MissingActionType { method } if method == "save"));
        assert!(channel.messages().is_empty());
    }

    #[test]
    fn test_type_map_generates_dispatch_only_method() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.assign_types(TypeMap::new().with("load", "LOAD"));

        assert!(creators.has_action("load"));
        creators.invoke("load", vec![json!(1), json!(2)]).unwrap();

        channel.assert_types(&[
            "LOAD_STARTING",
            "ACTION_STARTING",
            "LOAD",
            "LOAD_DONE",
            "ACTION_DONE",
        ]);
        let dispatched = channel.find("LOAD").unwrap();
        assert_eq!(dispatched.arguments, Some(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_type_map_never_overrides_existing_method() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register("save", |_, _| Ok(ActionOutcome::value("custom")));
        creators.assign_types(TypeMap::new().with("save", "SAVE"));

        let result = creators.invoke("save", vec![json!(1)]).unwrap();

        // The original body ran: no dispatch message, just lifecycle events.
        assert_eq!(result.value(), Some(&json!("custom")));
        assert!(channel.find("SAVE").is_none());
    }

    #[test]
    fn test_unknown_action() {
        let (_, creators) = harness("UserActionCreators");
        let err = creators.invoke("missing", vec![]).unwrap_err();
        assert!(matches!(err, ActionError::UnknownAction { method } if method == "missing"));
    }

    #[test]
    fn test_silent_metadata_suppresses_starting_and_done() {
        let (channel, mut creators) = harness("UserActionCreators");
        creators.register_with(
            "ping",
            ActionMetadata::typed("PING").silent(),
            |context, arguments| {
                context.dispatch(arguments);
                Ok(ActionOutcome::done())
            },
        );

        creators.invoke("ping", vec![]).unwrap();

        // Only the user dispatch itself, carrying the silent annotation.
        channel.assert_types(&["PING"]);
        let ping = channel.find("PING").unwrap();
        assert!(ping.annotations.flag("silent"));
    }

    #[test]
    fn test_context_exposes_container_identity() {
        let (_, mut creators) = harness("UserActionCreators");
        let seen = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
        let sink = seen.clone();
        creators.register("whoami", move |context, _| {
            *sink.lock().unwrap() = context.display_name().to_owned();
            Ok(ActionOutcome::done())
        });

        creators.invoke("whoami", vec![]).unwrap();
        assert_eq!(*seen.lock().unwrap(), "UserActionCreators");
    }

    #[test]
    fn test_derive_type_helper() {
        assert_eq!(ActionCreators::derive_type("fetch-user data"), "FETCH_USER_DATA");
    }
}
