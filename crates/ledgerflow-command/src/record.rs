//! Idempotency record state and lifecycle.
//!
//! This module provides:
//! - `RecordState`: The state machine for a keyed command outcome
//! - `IdempotencyRecord`: The durable outcome record for one idempotency key
//!
//! ## State Machine
//!
//! ```text
//! ┌───────────┐  handler ok   ┌───────────┐
//! │ IN_FLIGHT │──────────────►│ SUCCEEDED │
//! └───────────┘               └───────────┘
//!       │
//!       │ handler failed      ┌───────────┐
//!       └────────────────────►│  FAILED   │
//!                             └───────────┘
//! ```
//!
//! Terminal states are final: once a key is SUCCEEDED or FAILED its payload
//! is immutable and every replay returns it unchanged. A FAILED key never
//! transitions back to IN_FLIGHT.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ledgerflow_core::{CommandId, IdempotencyKey};

use crate::error::{Error, Result};

/// State of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    /// The handler for this key is currently executing.
    InFlight,
    /// The handler completed successfully; the result payload is cached.
    Succeeded,
    /// The handler failed terminally; the error payload is cached.
    Failed,
}

impl RecordState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// Only IN_FLIGHT may transition, and only to a terminal state.
    #[must_use]
    pub const fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::InFlight => matches!(target, Self::Succeeded | Self::Failed),
            Self::Succeeded | Self::Failed => false,
        }
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InFlight => write!(f, "IN_FLIGHT"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// The durable outcome record for one idempotency key.
///
/// Created in IN_FLIGHT state when a fresh key is reserved, mutated exactly
/// once on completion, and expired by the store's time-based policy. The
/// core never assumes records are retained forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    /// The idempotency key this record belongs to.
    pub key: IdempotencyKey,
    /// The command whose execution holds (or held) the reservation.
    ///
    /// An expired IN_FLIGHT record can be replaced by a fresh reservation
    /// while the original execution is still running; the store uses this
    /// field to reject the stale execution's terminal write.
    pub owner: CommandId,
    /// Current state.
    pub state: RecordState,
    /// HTTP status of the terminal outcome, absent while in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Terminal result or error payload, absent while in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record becomes eligible for eviction.
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Creates a fresh IN_FLIGHT record for the given key, owned by the
    /// reserving command.
    #[must_use]
    pub fn in_flight(
        key: IdempotencyKey,
        owner: CommandId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            key,
            owner,
            state: RecordState::InFlight,
            http_status: None,
            body: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns true if the record has passed its expiry instant.
    ///
    /// Expired records are treated as absent by the store: a retry after
    /// expiry is a fresh execution, not a replay.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Transitions the record to a terminal state with its outcome payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the record is already
    /// terminal or `target` is not a terminal state. Terminal payloads are
    /// immutable; no resurrection of a FAILED key is possible.
    pub fn complete(&mut self, target: RecordState, http_status: u16, body: Value) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
                reason: if self.state.is_terminal() {
                    "terminal states are final".into()
                } else {
                    "completion target must be terminal".into()
                },
            });
        }
        self.state = target;
        self.http_status = Some(http_status);
        self.body = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> IdempotencyKey {
        "abc".parse().unwrap()
    }

    #[test]
    fn in_flight_is_not_terminal() {
        assert!(!RecordState::InFlight.is_terminal());
        assert!(RecordState::Succeeded.is_terminal());
        assert!(RecordState::Failed.is_terminal());
    }

    #[test]
    fn in_flight_transitions_to_terminal_only() {
        assert!(RecordState::InFlight.can_transition_to(RecordState::Succeeded));
        assert!(RecordState::InFlight.can_transition_to(RecordState::Failed));
        assert!(!RecordState::InFlight.can_transition_to(RecordState::InFlight));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [RecordState::Succeeded, RecordState::Failed] {
            assert!(!terminal.can_transition_to(RecordState::InFlight));
            assert!(!terminal.can_transition_to(RecordState::Succeeded));
            assert!(!terminal.can_transition_to(RecordState::Failed));
        }
    }

    #[test]
    fn complete_records_outcome() {
        let now = Utc::now();
        let mut record =
            IdempotencyRecord::in_flight(key(), CommandId::generate(), now, Duration::hours(24));
        record
            .complete(RecordState::Succeeded, 200, json!({"id": 55}))
            .unwrap();

        assert_eq!(record.state, RecordState::Succeeded);
        assert_eq!(record.http_status, Some(200));
        assert_eq!(record.body, Some(json!({"id": 55})));
    }

    #[test]
    fn failed_key_never_resurrects() {
        let now = Utc::now();
        let mut record =
            IdempotencyRecord::in_flight(key(), CommandId::generate(), now, Duration::hours(24));
        record
            .complete(RecordState::Failed, 409, json!({"code": "error.conflict"}))
            .unwrap();

        let err = record
            .complete(RecordState::Succeeded, 200, json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("terminal states are final"));
        assert_eq!(record.state, RecordState::Failed);
        assert_eq!(record.http_status, Some(409));
    }

    #[test]
    fn record_expires_after_ttl() {
        let now = Utc::now();
        let record =
            IdempotencyRecord::in_flight(key(), CommandId::generate(), now, Duration::minutes(30));
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + Duration::minutes(30)));
        assert!(record.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn record_state_serializes_screaming_snake() {
        let json = serde_json::to_string(&RecordState::InFlight).unwrap();
        assert_eq!(json, "\"IN_FLIGHT\"");
    }
}
