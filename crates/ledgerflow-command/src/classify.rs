//! Conflict classification for handler failures.
//!
//! The dispatcher never inspects persistence-layer failure types directly.
//! Business handlers report failures through [`HandlerFailure`], and the
//! total [`classify`] function maps them onto the three-way idempotency
//! outcome taxonomy plus an HTTP-style status code.
//!
//! ## Classification Rules
//!
//! | Input | Kind | Status |
//! |-------|------|--------|
//! | `Domain` | `Business` | handler-declared |
//! | `VersionConflict` | `Conflict` | 409 |
//! | `ConstraintViolation` | `Conflict` | 409 |
//! | `Other` (anything else) | `Internal` | 500 |
//!
//! The classifier never fails: unclassifiable errors land in the `Internal`
//! bucket with a generic body that leaks no internals, and are logged at
//! error level with the full cause chain.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::wire;

/// A failure reported by a business handler.
///
/// Handlers translate their persistence layer's failure modes into these
/// variants; the dispatcher stays decoupled from any specific persistence
/// technology.
#[derive(Debug, thiserror::Error)]
pub enum HandlerFailure {
    /// A domain rule rejected the command deliberately.
    ///
    /// Carries the handler's own status and error payload, surfaced to the
    /// caller verbatim.
    #[error("domain rule violation (status {status})")]
    Domain {
        /// HTTP-style status declared by the handler.
        status: u16,
        /// Error payload to render to the client.
        body: Value,
    },

    /// The persistence layer reported a stale-version update conflict.
    #[error("optimistic lock conflict: {message}")]
    VersionConflict {
        /// Description of the conflicting update.
        message: String,
    },

    /// The persistence layer reported a uniqueness-constraint violation.
    #[error("constraint violation: {message}")]
    ConstraintViolation {
        /// Description of the violated constraint.
        message: String,
    },

    /// Any other failure.
    #[error("handler failure")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerFailure {
    /// Wraps an arbitrary error as an unclassified handler failure.
    #[must_use]
    pub fn other(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(source))
    }
}

/// The three-way idempotency outcome taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// A domain-rule rejection raised deliberately by the handler.
    Business,
    /// A concurrent-modification conflict; the caller may retry.
    Conflict,
    /// Anything unclassified; surfaced as a generic failure.
    Internal,
}

impl FailureKind {
    /// Returns the label value used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }

    /// Derives the kind from a recorded status code.
    ///
    /// Used when replaying a cached FAILED outcome, which persists only the
    /// status and payload.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            wire::STATUS_CONFLICT => Self::Conflict,
            500..=599 => Self::Internal,
            _ => Self::Business,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler failure mapped onto the outcome taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    /// Which bucket the failure landed in.
    pub kind: FailureKind,
    /// HTTP-style status to record and surface.
    pub http_status: u16,
    /// Error payload to record and surface.
    pub body: Value,
}

/// Maps a handler failure onto the outcome taxonomy.
///
/// Total: never fails, never panics. Conflicts and business failures log at
/// warning level; unclassified failures log at error level with the full
/// cause chain.
#[must_use]
pub fn classify(failure: &HandlerFailure) -> ClassifiedFailure {
    match failure {
        HandlerFailure::Domain { status, body } => {
            warn!(status, "command rejected by domain rule");
            ClassifiedFailure {
                kind: FailureKind::Business,
                http_status: *status,
                body: body.clone(),
            }
        }
        HandlerFailure::VersionConflict { message } => {
            warn!(%message, "optimistic lock conflict");
            ClassifiedFailure {
                kind: FailureKind::Conflict,
                http_status: wire::STATUS_CONFLICT,
                body: json!({
                    "code": "error.conflict",
                    "message": message,
                }),
            }
        }
        HandlerFailure::ConstraintViolation { message } => {
            warn!(%message, "constraint violation");
            ClassifiedFailure {
                kind: FailureKind::Conflict,
                http_status: wire::STATUS_CONFLICT,
                body: json!({
                    "code": "error.conflict",
                    "message": message,
                }),
            }
        }
        HandlerFailure::Other(source) => {
            error!(error = ?source, "unclassified handler failure");
            ClassifiedFailure {
                kind: FailureKind::Internal,
                http_status: wire::STATUS_INTERNAL,
                body: json!({
                    "code": "error.internal",
                    "message": "An unexpected error occurred while processing the command",
                }),
            }
        }
    }
}
