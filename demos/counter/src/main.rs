//! Counter - minimal flow-dispatch example
//!
//! Demonstrates the core pattern end to end:
//! - Store: a subscriber that folds dispatched messages into state
//! - ActionCreators: wrapped action methods sharing one dispatcher
//! - Lifecycle: STARTING/DONE/FAILED event pairs around every invocation
//! - Rollback: a failed action undoes its dispatched effect
//!
//! Run with `RUST_LOG=debug cargo run -p counter` to see the lifecycle
//! events the logger prints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flow_dispatch::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Store - folds INCREMENT messages into a count, undoes them on rollback
// ============================================================================

#[derive(Default)]
struct CounterStore {
    count: i64,
    /// Amount applied per invocation id, so a rollback can undo it.
    applied: HashMap<String, i64>,
}

impl CounterStore {
    fn handle(&mut self, message: &ActionMessage) {
        match message.type_name() {
            "INCREMENT" => {
                let amount = message
                    .arguments
                    .as_ref()
                    .and_then(|args| args.first())
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                self.count += amount;
                self.applied.insert(message.id.to_string(), amount);
                if let Some(handlers) = &message.handlers {
                    handlers.push(HandlerEntry::new("CounterStore", "onIncrement"));
                }
            }
            "INCREMENT_ROLLBACK" => {
                if let Some(amount) = self.applied.remove(message.id.as_str()) {
                    self.count -= amount;
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Main - wire the dispatcher, store, and action creators together
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dispatcher = Dispatcher::new();
    LifecycleLogger::new(LoggerConfig::default()).attach(&dispatcher);

    let store = Arc::new(Mutex::new(CounterStore::default()));
    let subscriber_store = store.clone();
    dispatcher.subscribe(move |message| {
        subscriber_store.lock().unwrap().handle(message);
    });

    let mut creators = ActionCreators::new("CounterActionCreators", Arc::new(dispatcher));

    // Synchronous action: dispatch and settle immediately.
    creators.register("increment", |context, arguments| {
        context.dispatch(arguments);
        Ok(ActionOutcome::done())
    });

    // Deferred action: the DONE pair fires when the future settles. The
    // authored metadata pins the INCREMENT type so the store folds it.
    creators.register_with(
        "incrementLater",
        ActionMetadata::typed("INCREMENT"),
        |context, arguments| {
            Ok(ActionOutcome::deferred(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                context.dispatch(arguments.clone());
                Ok(json!(null))
            }))
        },
    );

    // Failing action: its dispatched effect is rolled back.
    creators.register_with(
        "incrementUnstable",
        ActionMetadata::typed("INCREMENT"),
        |context, arguments| {
            context.dispatch(arguments);
            Err("flaky backend rejected the increment".into())
        },
    );

    creators.invoke("increment", vec![json!(2)])?;
    println!("after increment(2): {}", store.lock().unwrap().count);

    creators
        .invoke("incrementLater", vec![json!(3)])?
        .settled()
        .await?;
    println!("after incrementLater(3): {}", store.lock().unwrap().count);

    if let Err(err) = creators.invoke("incrementUnstable", vec![json!(100)]) {
        println!("incrementUnstable failed: {err}");
    }
    println!("after rollback: {}", store.lock().unwrap().count);

    Ok(())
}
