//! Lifecycle logging with pattern-based filtering
//!
//! A channel subscriber that logs dispatched messages through `tracing`,
//! with glob patterns to include/exclude event types. By default the
//! generic STARTING/DONE halves are excluded since they duplicate every
//! specific event; FAILED events always carry enough signal to keep.

use tracing::debug;

use crate::channel::Dispatcher;
use crate::message::ActionMessage;

/// Filter configuration for the lifecycle logger.
///
/// Patterns support `*` (any sequence) and `?` (any single character).
///
/// # Examples
///
/// - `USER_*` matches `USER_LOAD`, `USER_LOAD_STARTING`, ...
/// - `*_FAILED` matches every failure event
/// - `ACTION_?ONE` matches `ACTION_DONE`
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// If non-empty, only log event types matching these patterns.
    pub include_patterns: Vec<String>,
    /// Exclude event types matching these patterns (applied after include).
    pub exclude_patterns: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: vec!["ACTION_STARTING".to_owned(), "ACTION_DONE".to_owned()],
        }
    }
}

impl LoggerConfig {
    /// Build a config from comma-separated pattern strings.
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        let split = |s: &str| -> Vec<String> {
            s.split(',').map(|p| p.trim().to_owned()).collect()
        };
        Self {
            include_patterns: include.map(split).unwrap_or_default(),
            exclude_patterns: exclude
                .map(split)
                .unwrap_or_else(|| Self::default().exclude_patterns),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Whether an event type passes the include/exclude patterns.
    pub fn should_log(&self, type_name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|p| glob_match(p, type_name))
        {
            return false;
        }
        !self
            .exclude_patterns
            .iter()
            .any(|p| glob_match(p, type_name))
    }
}

/// Logs every message a dispatcher fans out, subject to its filter.
#[derive(Debug, Clone)]
pub struct LifecycleLogger {
    config: LoggerConfig,
}

impl LifecycleLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self { config }
    }

    /// Logger with no filtering.
    pub fn log_all() -> Self {
        Self::new(LoggerConfig::with_patterns(vec![], vec![]))
    }

    /// Subscribe this logger to a dispatcher.
    pub fn attach(self, dispatcher: &Dispatcher) {
        dispatcher.subscribe(move |message| self.log(message));
    }

    fn log(&self, message: &ActionMessage) {
        if !self.config.should_log(message.type_name()) {
            return;
        }
        debug!(
            action_type = message.type_name(),
            id = %message.id,
            internal = message.internal,
            handlers = message.handlers.as_ref().map(|h| h.len()).unwrap_or(0),
            "action dispatched"
        );
    }
}

/// Match `text` against a glob `pattern` (`*` any run, `?` one character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_exact() {
        assert!(glob_match("ACTION_DONE", "ACTION_DONE"));
        assert!(!glob_match("ACTION_DONE", "ACTION_FAILED"));
        assert!(!glob_match("ACTION_DONE", "ACTION_DONE_LATER"));
    }

    #[test]
    fn test_glob_star() {
        assert!(glob_match("USER_*", "USER_LOAD"));
        assert!(glob_match("USER_*", "USER_"));
        assert!(!glob_match("USER_*", "ADMIN_LOAD"));
        assert!(glob_match("*_FAILED", "SAVE_FAILED"));
        assert!(glob_match("*_STARTING*", "LOAD_STARTING"));
    }

    #[test]
    fn test_glob_question() {
        assert!(glob_match("ACTION_?ONE", "ACTION_DONE"));
        assert!(!glob_match("ACTION_?ONE", "ACTION_ONE"));
    }

    #[test]
    fn test_default_excludes_generic_starting_and_done() {
        let config = LoggerConfig::default();
        assert!(!config.should_log("ACTION_STARTING"));
        assert!(!config.should_log("ACTION_DONE"));
        assert!(config.should_log("ACTION_FAILED"));
        assert!(config.should_log("INCREMENT_STARTING"));
    }

    #[test]
    fn test_include_patterns_restrict() {
        let config = LoggerConfig::new(Some("*_FAILED,SAVE*"), Some(""));
        assert!(config.should_log("LOAD_FAILED"));
        assert!(config.should_log("SAVE_DONE"));
        assert!(!config.should_log("LOAD_DONE"));
    }
}
