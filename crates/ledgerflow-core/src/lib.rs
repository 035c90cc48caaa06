//! # ledgerflow-core
//!
//! Core abstractions for the ledgerflow coordination layer.
//!
//! This crate provides the foundational types used across all ledgerflow
//! components:
//!
//! - **Identifiers**: Strongly-typed IDs for commands, batch runs, and
//!   domain entities
//! - **Idempotency Keys**: Validated client-supplied retry tokens
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `ledgerflow-core` is the **only** crate allowed to define shared
//! primitives. The command dispatcher and the business-step runner both
//! build on the types defined here and never on each other.
//!
//! ## Example
//!
//! ```rust
//! use ledgerflow_core::prelude::*;
//!
//! let command_id = CommandId::generate();
//! let loan: EntityId = EntityId::new(101);
//! let key: IdempotencyKey = "client-retry-token-1".parse().unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;

pub use error::{Error, Result};
pub use id::{CommandId, EntityId, IdempotencyKey, RunId};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use ledgerflow_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{CommandId, EntityId, IdempotencyKey, RunId};
}
