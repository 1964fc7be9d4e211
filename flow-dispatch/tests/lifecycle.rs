//! End-to-end lifecycle scenarios through the public API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flow_dispatch::testing::RecordingChannel;
use flow_dispatch::{
    ActionCreators, ActionError, ActionMetadata, ActionOutcome, Dispatcher, TypeMap,
};
use serde_json::json;

fn harness(name: &str) -> (RecordingChannel, ActionCreators) {
    let channel = RecordingChannel::new();
    let creators = ActionCreators::new(name, Arc::new(channel.clone()));
    (channel, creators)
}

#[test]
fn increment_scenario_emits_full_sequence() {
    let (channel, mut creators) = harness("CounterActionCreators");
    creators.register("increment", |context, arguments| {
        context.dispatch(arguments);
        Ok(ActionOutcome::done())
    });

    creators.invoke("increment", vec![json!(5)]).unwrap();

    channel.assert_types(&[
        "INCREMENT_STARTING",
        "ACTION_STARTING",
        "INCREMENT",
        "INCREMENT_DONE",
        "ACTION_DONE",
    ]);
    let payload = channel.find("INCREMENT").unwrap();
    assert_eq!(payload.arguments, Some(vec![json!(5)]));
}

#[test]
fn silent_action_produces_empty_sequence() {
    let (channel, mut creators) = harness("CounterActionCreators");
    creators.register_with(
        "tick",
        ActionMetadata::typed("TICK").silent(),
        |_, _| Ok(ActionOutcome::done()),
    );

    creators.invoke("tick", vec![]).unwrap();

    assert!(channel.messages().is_empty());
}

#[test]
fn sync_failure_resurfaces_and_always_emits_failed_pair() {
    let (channel, mut creators) = harness("CounterActionCreators");
    creators.register("explode", |_, _| Err("kaboom".into()));

    let err = creators.invoke("explode", vec![]).unwrap_err();

    assert!(matches!(err, ActionError::Failed { .. }));
    channel.assert_types(&[
        "EXPLODE_STARTING",
        "ACTION_STARTING",
        "EXPLODE_FAILED",
        "ACTION_FAILED",
    ]);
    let failed = channel.find("ACTION_FAILED").unwrap();
    assert_eq!(failed.error.unwrap().message, "kaboom");
}

#[tokio::test]
async fn deferred_rejection_rolls_back_dispatched_handle_once() {
    let (channel, mut creators) = harness("DraftActionCreators");
    creators.register("saveDraft", |context, arguments| {
        context.dispatch(arguments);
        Ok(ActionOutcome::deferred(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err("server said no".into())
        }))
    });

    let result = creators.invoke("saveDraft", vec![json!("text")]).unwrap();
    assert!(result.is_pending());

    let err = result.settled().await.unwrap_err();
    assert!(matches!(err, ActionError::Failed { .. }));

    channel.assert_types(&[
        "SAVE_DRAFT_STARTING",
        "ACTION_STARTING",
        "SAVE_DRAFT",
        "SAVE_DRAFT_FAILED",
        "ACTION_FAILED",
    ]);
    let dispatched = channel.find("SAVE_DRAFT").unwrap();
    assert_eq!(channel.rollbacks(), vec![dispatched.id]);
}

#[tokio::test]
async fn deferred_success_fires_done_after_settlement() {
    let (channel, mut creators) = harness("UserActionCreators");
    creators.register("loadUserProfile", |_, _| {
        Ok(ActionOutcome::deferred(async {
            Ok(json!({ "name": "ada" }))
        }))
    });

    let result = creators.invoke("loadUserProfile", vec![json!(7)]).unwrap();
    let value = result.settled().await.unwrap();
    assert_eq!(value["name"], "ada");

    channel.assert_types(&[
        "LOAD_USER_PROFILE_STARTING",
        "ACTION_STARTING",
        "LOAD_USER_PROFILE_DONE",
        "ACTION_DONE",
    ]);
}

#[test]
fn type_derivation_examples() {
    assert_eq!(
        ActionCreators::derive_type("loadUserProfile"),
        "LOAD_USER_PROFILE"
    );
    assert_eq!(
        ActionCreators::derive_type("fetch-user data"),
        "FETCH_USER_DATA"
    );
}

#[test]
fn type_map_assignment_is_additive_and_non_destructive() {
    let (channel, mut creators) = harness("StorageActionCreators");

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    creators.register("save", move |_, _| {
        *flag.lock().unwrap() = true;
        Ok(ActionOutcome::done())
    });

    creators.assign_types(TypeMap::new().with("save", "SAVE").with("load", "LOAD"));

    // Existing method keeps its body: it runs and never dispatches.
    creators.invoke("save", vec![]).unwrap();
    assert!(*ran.lock().unwrap());
    assert!(channel.find("SAVE").is_none());

    // Auto-generated method forwards all arguments to dispatch.
    creators.invoke("load", vec![json!(1), json!(2)]).unwrap();
    let load = channel.find("LOAD").unwrap();
    assert_eq!(load.arguments, Some(vec![json!(1), json!(2)]));
}

#[tokio::test]
async fn concurrent_invocations_keep_independent_state() {
    let (channel, mut creators) = harness("CounterActionCreators");
    creators.register("bump", |context, arguments| {
        Ok(ActionOutcome::deferred(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            context.dispatch(arguments.clone());
            Ok(json!(arguments))
        }))
    });

    let creators = Arc::new(creators);
    let first = creators.invoke("bump", vec![json!(1)]).unwrap();
    let second = creators.invoke("bump", vec![json!(2)]).unwrap();

    let a = first.settled().await.unwrap();
    let b = second.settled().await.unwrap();
    assert_eq!(a, json!([1]));
    assert_eq!(b, json!([2]));

    let bumps: Vec<_> = channel
        .messages()
        .into_iter()
        .filter(|m| m.type_name() == "BUMP")
        .collect();
    assert_eq!(bumps.len(), 2);
    assert_ne!(bumps[0].id, bumps[1].id);
}

#[test]
fn rollback_notification_flows_through_dispatcher() {
    let dispatcher = Dispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher.subscribe(move |message| {
        sink.lock().unwrap().push(message.type_name().to_owned());
    });

    let mut creators = ActionCreators::new("OrderActionCreators", Arc::new(dispatcher));
    creators.register("placeOrder", |context, arguments| {
        context.dispatch(arguments);
        Err("payment declined".into())
    });

    creators.invoke("placeOrder", vec![json!("order-1")]).unwrap_err();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "PLACE_ORDER_STARTING",
            "ACTION_STARTING",
            "PLACE_ORDER",
            "PLACE_ORDER_FAILED",
            "ACTION_FAILED",
            "PLACE_ORDER_ROLLBACK",
        ]
    );
}
