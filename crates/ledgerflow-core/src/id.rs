//! Strongly-typed identifiers for ledgerflow entities.
//!
//! All generated identifiers are:
//! - **Strongly typed**: Prevents mixing up different ID types at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time and sort naturally
//! - **Globally unique**: No coordination required for generation
//!
//! Entity identifiers ([`EntityId`]) are an exception: they wrap the numeric
//! primary keys assigned by the surrounding platform's persistence layer and
//! are never generated here.
//!
//! # Example
//!
//! ```rust
//! use ledgerflow_core::id::{CommandId, EntityId, RunId};
//!
//! let command = CommandId::generate();
//! let run = RunId::generate();
//! let loan = EntityId::new(101);
//!
//! // IDs are different types - this won't compile:
//! // let wrong: CommandId = run;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Maximum accepted length of a client-supplied idempotency key.
///
/// Matches the storage column width reserved for the key by backing stores.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// A unique identifier for one write-command dispatch.
///
/// Generated when a command descriptor is built, and carried through logs
/// and metrics so a single write intent can be correlated end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Ulid);

impl CommandId {
    /// Generates a new unique command ID.
    ///
    /// Uses ULID generation which is:
    /// - Lexicographically sortable by creation time
    /// - Globally unique without coordination
    /// - URL-safe and case-insensitive
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a command ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Returns the creation timestamp encoded in the ID.
    #[must_use]
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        let ms = self.0.timestamp_ms();
        #[allow(clippy::cast_possible_wrap)]
        chrono::DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(chrono::Utc::now)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::invalid_id(format!("invalid command ID '{s}': {e}")))
    }
}

/// A unique identifier for a batch job run.
///
/// Each invocation of the job runner gets its own run ID, reported back in
/// the batch report and attached to every per-step log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Ulid);

impl RunId {
    /// Generates a new unique run ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a run ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Returns the creation timestamp encoded in the ID.
    #[must_use]
    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        let ms = self.0.timestamp_ms();
        #[allow(clippy::cast_possible_wrap)]
        chrono::DateTime::from_timestamp_millis(ms as i64).unwrap_or_else(chrono::Utc::now)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::invalid_id(format!("invalid run ID '{s}': {e}")))
    }
}

/// The numeric primary key of a domain entity (loan, savings account, ...).
///
/// These keys are assigned by the platform's persistence layer; this core
/// only transports them, it never generates them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw numeric entity key.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric key.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A client-supplied token identifying a logically single write intent
/// across retries.
///
/// Keys are validated on construction: they must be non-empty after
/// trimming and no longer than [`MAX_IDEMPOTENCY_KEY_LEN`] bytes. The key
/// is opaque to the core; equality is exact byte equality of the trimmed
/// value. Deserialization goes through the same validation, so an invalid
/// key can never enter through a serialized descriptor or record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validates and wraps a client-supplied key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the key is empty after trimming or
    /// exceeds [`MAX_IDEMPOTENCY_KEY_LEN`] bytes.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_key("key must not be empty"));
        }
        if trimmed.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(Error::invalid_key(format!(
                "key exceeds {MAX_IDEMPOTENCY_KEY_LEN} bytes ({} given)",
                trimmed.len()
            )));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdempotencyKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_are_unique() {
        let a = CommandId::generate();
        let b = CommandId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn command_id_round_trips_through_string() {
        let id = CommandId::generate();
        let parsed: CommandId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn run_id_rejects_garbage() {
        let result: Result<RunId> = "not-a-ulid!".parse();
        assert!(result.is_err());
    }

    #[test]
    fn entity_id_preserves_value() {
        let id = EntityId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn entity_id_orders_numerically() {
        assert!(EntityId::new(2) < EntityId::new(10));
    }

    #[test]
    fn idempotency_key_trims_whitespace() {
        let key = IdempotencyKey::new("  abc  ").unwrap();
        assert_eq!(key.as_str(), "abc");
    }

    #[test]
    fn idempotency_key_rejects_empty() {
        assert!(IdempotencyKey::new("   ").is_err());
        assert!(IdempotencyKey::new("").is_err());
    }

    #[test]
    fn idempotency_key_rejects_oversized() {
        let oversized = "x".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(IdempotencyKey::new(oversized).is_err());
    }

    #[test]
    fn idempotency_key_accepts_max_length() {
        let max = "x".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        assert!(IdempotencyKey::new(max).is_ok());
    }

    #[test]
    fn idempotency_key_deserialization_is_validated() {
        assert!(serde_json::from_str::<IdempotencyKey>("\"\"").is_err());
        assert!(serde_json::from_str::<IdempotencyKey>("\"   \"").is_err());

        let oversized = format!("\"{}\"", "x".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1));
        assert!(serde_json::from_str::<IdempotencyKey>(&oversized).is_err());

        // Valid keys come out trimmed, same as construction via new().
        let key: IdempotencyKey = serde_json::from_str("\"  abc  \"").unwrap();
        assert_eq!(key.as_str(), "abc");
    }

    #[test]
    fn ids_serialize_transparently() {
        let entity = EntityId::new(7);
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, "7");

        let key = IdempotencyKey::new("abc").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
