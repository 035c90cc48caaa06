//! Pluggable storage for idempotency records.
//!
//! The store is the only shared mutable resource in the command core, and
//! it is accessed exclusively through the operations defined here.
//!
//! ## Design Principles
//!
//! - **Atomic reservation**: `reserve` is a single insert-if-absent
//!   operation, never a read-then-write, so two concurrent requests with
//!   the same key cannot both observe "no record"
//! - **Bounded retention**: records carry an expiry instant; the core never
//!   assumes they are retained forever
//! - **Testability**: In-memory implementation for testing, a database or
//!   cache for production

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use ledgerflow_core::{CommandId, IdempotencyKey};

use crate::error::Result;
use crate::record::{IdempotencyRecord, RecordState};

/// Result of an atomic reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// No live record existed; an IN_FLIGHT record was inserted and the
    /// caller owns the execution for this key.
    Reserved,
    /// Another execution currently holds the key IN_FLIGHT.
    StillInFlight,
    /// A terminal record exists; its outcome must be replayed unchanged.
    Replay(IdempotencyRecord),
}

impl ReserveOutcome {
    /// Returns true if the caller won the reservation.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// Storage abstraction for idempotency records.
///
/// ## Reservation Semantics
///
/// The `reserve` method is the core primitive for at-most-once execution:
/// - Prevents double execution of the business handler
/// - Makes a concurrent duplicate observable as [`ReserveOutcome::StillInFlight`]
/// - Surfaces terminal outcomes for byte-identical replay
///
/// Implementations must make the insert-if-absent atomic (a conditional
/// insert or unique-constraint insert); this atomicity is the load-bearing
/// invariant of the dispatcher.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from multiple
/// request workers.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically reserves the key for the given command if no live record
    /// exists.
    ///
    /// Records past their expiry instant are treated as absent. Returns
    /// what the caller should do next; infrastructure failures are returned
    /// as errors and never folded into the outcome taxonomy.
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        owner: CommandId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome>;

    /// Transitions the key's IN_FLIGHT record to a terminal state.
    ///
    /// `owner` must be the command that won the reservation. An execution
    /// whose IN_FLIGHT record expired and was re-reserved by a retry has
    /// lost the key; its late terminal write must not overwrite the new
    /// reservation.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleReservation`](crate::error::Error::StaleReservation)
    ///   if the record is now owned by a different command
    /// - Fails if no record exists for the key or the record is already
    ///   terminal; the dispatcher is the only writer, so either indicates a
    ///   bug or an eviction race
    async fn complete(
        &self,
        key: &IdempotencyKey,
        owner: CommandId,
        state: RecordState,
        http_status: u16,
        body: Value,
    ) -> Result<()>;

    /// Returns the record for the key, if one exists (expired or not).
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>>;

    /// Removes expired records, returning how many were evicted.
    ///
    /// Eviction scheduling is an operational concern owned by the caller.
    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_outcome_is_reserved() {
        assert!(ReserveOutcome::Reserved.is_reserved());
        assert!(!ReserveOutcome::StillInFlight.is_reserved());
    }
}
