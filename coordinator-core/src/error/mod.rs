//! Closed error taxonomy for the coordination engine.
//!
//! Propagation policy: local recoveries (storage fallback, single-handler
//! isolation, LLM-to-pattern fallback) are logged but invisible to callers.
//! Request-shaping failures (no ready task, breaker open) return `Ok(None)`
//! or a typed empty result at the call site, not an error. Configuration and
//! schema failures propagate — they indicate a bug, not a transient fault.

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Persistence backend returned an error. Handled by the fallback
    /// wrapper at the call site; in-memory state remains authoritative.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A named circuit breaker is open and is rejecting calls.
    #[error("circuit breaker '{name}' is open")]
    BreakerOpen { name: String },

    /// One event subscriber raised during dispatch. Isolated to that
    /// subscriber; other subscribers still run.
    #[error("event handler '{handler}' failed: {source}")]
    HandlerFailure {
        handler: String,
        #[source]
        source: Box<Error>,
    },

    /// A Kanban or LLM call failed in a way expected to clear on retry.
    #[error("remote call transient failure: {0}")]
    RemoteTransient(String),

    /// A Kanban or LLM call exhausted its retry budget.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Config validation or a malformed persistence payload.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// A dependency cycle survived cycle-breaking (should be unreachable
    /// after the hybrid inferer's cycle-resolution pass).
    #[error("dependency graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl Error {
    /// Whether an operation that produced this error is worth retrying with
    /// backoff, and whether it should count against a circuit breaker.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::StorageFailure(_)
            | Error::RemoteTransient(_)
            | Error::RemoteUnavailable(_)
            | Error::Io(_)
            | Error::Sql(_) => true,
            Error::BreakerOpen { .. }
            | Error::HandlerFailure { .. }
            | Error::ValidationFailure(_)
            | Error::GraphInconsistency(_)
            | Error::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failure_is_recoverable() {
        assert!(Error::StorageFailure("down".to_string()).is_recoverable());
    }

    #[test]
    fn breaker_open_is_not_recoverable() {
        let err = Error::BreakerOpen {
            name: "kanban".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn validation_failure_is_not_recoverable() {
        assert!(!Error::ValidationFailure("bad threshold".to_string()).is_recoverable());
    }

    #[test]
    fn graph_inconsistency_is_not_recoverable() {
        assert!(!Error::GraphInconsistency("cycle survived".to_string()).is_recoverable());
    }

    #[test]
    fn remote_transient_and_unavailable_are_recoverable() {
        assert!(Error::RemoteTransient("timeout".to_string()).is_recoverable());
        assert!(Error::RemoteUnavailable("exhausted".to_string()).is_recoverable());
    }

    #[test]
    fn handler_failure_is_isolated_not_recoverable() {
        let err = Error::HandlerFailure {
            handler: "notify".to_string(),
            source: Box::new(Error::ValidationFailure("bad payload".to_string())),
        };
        assert!(!err.is_recoverable());
    }
}
