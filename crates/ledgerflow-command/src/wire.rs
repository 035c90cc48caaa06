//! Wire-contract constants shared with the REST layer.
//!
//! The HTTP binding itself is out of scope for this crate; these constants
//! pin down the header names and status codes the surrounding API layer is
//! expected to map so that retried clients observe consistent semantics.

/// Request header carrying the client-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Response header the REST layer sets to `true` when the returned outcome
/// was replayed from the idempotency cache rather than freshly executed.
pub const IDEMPOTENT_CACHE_HEADER: &str = "x-idempotent-cache";

/// Status returned when a duplicate request hits an in-flight key.
///
/// 425 Too Early: the caller should retry later; the original execution is
/// still running and is never waited on.
pub const STATUS_STILL_PROCESSING: u16 = 425;

/// Status used for version and uniqueness conflicts.
pub const STATUS_CONFLICT: u16 = 409;

/// Status used for unclassified internal failures.
pub const STATUS_INTERNAL: u16 = 500;
