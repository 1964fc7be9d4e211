//! Action types, annotations, and type resolution
//!
//! Every invocation resolves to a canonical action-type token plus a bag of
//! behavioral annotations (e.g. `silent`). Resolution is a pure function of
//! the authored metadata, the container's declared type map, and a fallback
//! naming transform.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ActionError;

/// Canonical action-type token (e.g. `LOAD_USER_PROFILE`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(String);

impl ActionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{suffix}", self.0))
    }
}

impl From<&str> for ActionType {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<&str> for ActionType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive an action type from a method name.
///
/// Inserts `_` between a lowercase letter or digit and a following uppercase
/// run, collapses runs of hyphens and whitespace into a single `_`, and
/// upper-cases the result. Total and idempotent.
///
/// # Examples
///
/// ```
/// use flow_dispatch_core::action::derive_action_type;
///
/// assert_eq!(derive_action_type("loadUserProfile"), "LOAD_USER_PROFILE");
/// assert_eq!(derive_action_type("fetch-user data"), "FETCH_USER_DATA");
/// ```
pub fn derive_action_type(name: &str) -> ActionType {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch == '-' || ch.is_whitespace() {
            pending_separator = true;
            prev_lower_or_digit = false;
            continue;
        }
        if pending_separator {
            if !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
        }
        if ch.is_uppercase() && prev_lower_or_digit {
            out.push('_');
        }
        prev_lower_or_digit = ch.is_lowercase() || ch.is_ascii_digit();
        for upper in ch.to_uppercase() {
            out.push(upper);
        }
    }

    ActionType(out)
}

/// Immutable key/value bag attached to an action (e.g. `{silent: true}`).
///
/// Annotation flags follow loose truthiness: `false`, `null`, `0`, and `""`
/// do not count as set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, Value>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub(crate) fn set(&mut self, key: String, value: Value) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the given annotation is set to a truthy value.
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(is_truthy)
    }

    /// Whether the `silent` annotation is set, suppressing the STARTING and
    /// DONE event pairs (never FAILED).
    pub fn is_silent(&self) -> bool {
        self.flag("silent")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Authored metadata attached to an action function at registration.
///
/// Metadata that is present must declare a type; the remaining fields become
/// the invocation's annotations.
#[derive(Clone, Debug, Default)]
pub struct ActionMetadata {
    action_type: Option<ActionType>,
    annotations: Annotations,
}

impl ActionMetadata {
    /// Metadata declaring an explicit action type.
    pub fn typed(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: Some(action_type.into()),
            annotations: Annotations::default(),
        }
    }

    /// Metadata with no type. Invoking an action registered with this fails
    /// with [`ActionError::MissingActionType`].
    pub fn untyped() -> Self {
        Self::default()
    }

    /// Attach an annotation field.
    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations = self.annotations.insert(key, value);
        self
    }

    /// Mark the action silent.
    pub fn silent(self) -> Self {
        self.annotate("silent", true)
    }

    pub fn action_type(&self) -> Option<&ActionType> {
        self.action_type.as_ref()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// Declared method-name → action-type map for a container.
#[derive(Clone, Debug, Default)]
pub struct TypeMap(HashMap<String, ActionType>);

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, method: impl Into<String>, action_type: impl Into<ActionType>) -> Self {
        self.0.insert(method.into(), action_type.into());
        self
    }

    pub fn get(&self, method: &str) -> Option<&ActionType> {
        self.0.get(method)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionType)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ActionType>> FromIterator<(K, V)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Resolved type and annotations for one invocation.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub action_type: ActionType,
    pub annotations: Annotations,
}

/// Fallback namer turning a method name into an action type.
pub type TypeNamer = fn(&str) -> ActionType;

/// Resolve the action type and annotations for a named method.
///
/// Precedence: authored metadata (its explicit type wins, remaining fields
/// become annotations; metadata without a type is an error), then the
/// container's declared type map, then the `namer` transform. Pure; called
/// once per invocation.
pub fn resolve(
    metadata: Option<&ActionMetadata>,
    method: &str,
    declared: &TypeMap,
    namer: TypeNamer,
) -> Result<Resolved, ActionError> {
    if let Some(meta) = metadata {
        let Some(action_type) = meta.action_type() else {
            return Err(ActionError::MissingActionType {
                method: method.to_owned(),
            });
        };
        return Ok(Resolved {
            action_type: action_type.clone(),
            annotations: meta.annotations().clone(),
        });
    }

    if let Some(action_type) = declared.get(method) {
        return Ok(Resolved {
            action_type: action_type.clone(),
            annotations: Annotations::default(),
        });
    }

    Ok(Resolved {
        action_type: namer(method),
        annotations: Annotations::default(),
    })
}
