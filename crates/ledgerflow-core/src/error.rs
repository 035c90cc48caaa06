//! Shared error definitions for ledgerflow primitives.

/// The result type used throughout ledgerflow-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing shared primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An identifier failed to parse.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// Description of the parse failure.
        message: String,
    },

    /// A client-supplied idempotency key failed validation.
    #[error("invalid idempotency key: {message}")]
    InvalidKey {
        /// Description of the validation failure.
        message: String,
    },
}

impl Error {
    /// Creates a new invalid-identifier error.
    #[must_use]
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    /// Creates a new invalid-key error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_id_display() {
        let err = Error::invalid_id("not a ULID");
        assert!(err.to_string().contains("invalid identifier"));
        assert!(err.to_string().contains("not a ULID"));
    }

    #[test]
    fn invalid_key_display() {
        let err = Error::invalid_key("empty key");
        assert!(err.to_string().contains("invalid idempotency key"));
    }
}
