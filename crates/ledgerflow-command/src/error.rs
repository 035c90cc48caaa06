//! Error types for the command dispatch domain.
//!
//! These errors cover infrastructure-level failures only. Business-level
//! failures travel through the outcome taxonomy in
//! [`crate::dispatch::DispatchOutcome`] instead, so the state machine stays
//! explicit and exception-style control flow is avoided.

/// The result type used throughout ledgerflow-command.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in command dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation against the idempotency store failed.
    ///
    /// Store-level failures are fatal to the dispatch call and are never
    /// folded into the idempotency outcome taxonomy.
    #[error("idempotency store error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A terminal write arrived from an execution that no longer holds the
    /// key's reservation.
    ///
    /// Happens when an IN_FLIGHT record expires mid-execution and a retry
    /// re-reserves the key; the original execution's outcome is discarded.
    #[error("reservation for key '{key}' is no longer held by command {command_id}")]
    StaleReservation {
        /// The contested idempotency key.
        key: String,
        /// The command whose reservation lapsed.
        command_id: String,
    },

    /// An invalid idempotency record state transition was attempted.
    #[error("invalid record state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn storage_error_display() {
        let err = Error::storage("connection refused");
        assert!(err.to_string().contains("idempotency store error"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn storage_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = Error::storage_with_source("reserve failed", source);
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn transition_error_display() {
        let err = Error::InvalidStateTransition {
            from: "SUCCEEDED".into(),
            to: "IN_FLIGHT".into(),
            reason: "terminal states are final".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SUCCEEDED"));
        assert!(msg.contains("IN_FLIGHT"));
        assert!(msg.contains("terminal states are final"));
    }
}
