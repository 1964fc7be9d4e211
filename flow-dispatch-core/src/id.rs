//! Unique tokens for invocations and action-creator instances

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token identifying all events from a single action invocation.
///
/// Collision-free within one process lifetime; no stronger guarantee.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..16].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token identifying an action-creator instance, prefixed with its kind
/// (e.g. `UserActionCreators-4fa3…`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh id carrying the given kind as a readable prefix.
    pub fn generate(kind: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self(format!("{kind}-{}", &token[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
