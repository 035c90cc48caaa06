//! In-memory idempotency store implementation.
//!
//! This module provides [`InMemoryIdempotencyStore`], a thread-safe
//! in-memory implementation of the [`IdempotencyStore`] trait suitable for
//! testing and single-process development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process boundaries
//! - **No persistence**: All records are lost when the process exits

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use ledgerflow_core::{CommandId, IdempotencyKey};

use super::{IdempotencyStore, ReserveOutcome};
use crate::error::{Error, Result};
use crate::record::{IdempotencyRecord, RecordState};

/// Default record time-to-live: 24 hours.
const DEFAULT_TTL_HOURS: i64 = 24;

/// In-memory idempotency store.
///
/// Provides a simple, thread-safe implementation of [`IdempotencyStore`]
/// using `RwLock` for synchronization. The reservation path takes the write
/// lock for the whole check-and-insert, which makes it atomic with respect
/// to concurrent reservations.
///
/// ## Example
///
/// ```rust
/// use ledgerflow_command::store::memory::InMemoryIdempotencyStore;
///
/// let store = InMemoryIdempotencyStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug)]
pub struct InMemoryIdempotencyStore {
    records: RwLock<HashMap<IdempotencyKey, IdempotencyRecord>>,
    ttl: Duration,
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryIdempotencyStore {
    /// Creates a new store with the default 24-hour record TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Creates a store with a custom record TTL.
    ///
    /// Use a short TTL to test expiry behavior.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the number of records currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record_count(&self) -> Result<usize> {
        let count = {
            let records = self.records.read().map_err(poison_err)?;
            records.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        owner: CommandId,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome> {
        let mut records = self.records.write().map_err(poison_err)?;

        if let Some(existing) = records.get(key) {
            if !existing.is_expired(now) {
                let outcome = if existing.state.is_terminal() {
                    ReserveOutcome::Replay(existing.clone())
                } else {
                    ReserveOutcome::StillInFlight
                };
                drop(records);
                return Ok(outcome);
            }
            // Expired record: treated as absent, the reservation below replaces it.
        }

        records.insert(
            key.clone(),
            IdempotencyRecord::in_flight(key.clone(), owner, now, self.ttl),
        );
        drop(records);
        Ok(ReserveOutcome::Reserved)
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        owner: CommandId,
        state: RecordState,
        http_status: u16,
        body: Value,
    ) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;

        let Some(record) = records.get_mut(key) else {
            drop(records);
            return Err(Error::storage(format!(
                "no idempotency record for key '{key}'"
            )));
        };

        if record.owner != owner {
            drop(records);
            return Err(Error::StaleReservation {
                key: key.to_string(),
                command_id: owner.to_string(),
            });
        }

        let result = record.complete(state, http_status, body);
        drop(records);
        result
    }

    async fn get(&self, key: &IdempotencyKey) -> Result<Option<IdempotencyRecord>> {
        let result = {
            let records = self.records.read().map_err(poison_err)?;
            records.get(key).cloned()
        };
        Ok(result)
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().map_err(poison_err)?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        let evicted = before - records.len();
        drop(records);
        Ok(evicted)
    }
}
