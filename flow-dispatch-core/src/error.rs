//! Error types and the transport-safe error report

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::ActionType;

/// Boxed error returned by action functions.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors surfaced by the lifecycle engine.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Authored metadata was attached to an action without declaring a type.
    /// Surfaces at the first invocation of the offending action.
    #[error("metadata for action `{method}` does not declare a type")]
    MissingActionType { method: String },

    /// No action with this name is registered on the container.
    #[error("no action named `{method}` is registered")]
    UnknownAction { method: String },

    /// The wrapped action function failed. The original error is preserved
    /// as the source; the FAILED event pair has already been emitted.
    #[error("action `{action_type}` failed")]
    Failed {
        action_type: ActionType,
        #[source]
        source: BoxError,
    },

    /// The driver task of a deferred outcome panicked or was aborted, so
    /// the action never settled.
    #[error("action `{action_type}` did not settle")]
    Interrupted { action_type: ActionType },
}

impl ActionError {
    /// The original error returned by the action function, if this is a
    /// wrapped-function failure.
    pub fn into_source(self) -> Option<BoxError> {
        match self {
            Self::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Plain, transport-safe representation of an error.
///
/// Construction never fails: any error flattens into its message plus the
/// messages of its source chain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chain: Vec::new(),
        }
    }

    /// Flatten an error and its source chain.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            chain,
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.chain {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}
