//! # ledgerflow-command
//!
//! Idempotent dispatch of write commands for the ledgerflow coordination core.
//!
//! This crate makes non-idempotent financial mutations (disbursements,
//! repayments, approvals) safe to retry over an unreliable network. It
//! provides:
//!
//! - **Command Descriptor**: An immutable value describing one write intent
//! - **Idempotency Store**: Keyed outcome records with an atomic in-flight
//!   reservation primitive
//! - **Conflict Classifier**: A total mapping from handler failures onto the
//!   idempotency outcome taxonomy
//! - **Command Dispatcher**: At-most-once handler execution per idempotency
//!   key, with deterministic replay of recorded outcomes
//!
//! ## Guarantees
//!
//! - **At-most-once**: For a fixed key, the handler body runs exactly once
//!   across any number of concurrent or retried calls
//! - **Replay fidelity**: A terminal outcome is replayed byte-identical and
//!   flagged as a cache hit
//! - **Fail fast**: A duplicate hitting an in-flight key is rejected
//!   immediately, never queued behind the other execution
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledgerflow_command::command::CommandDescriptor;
//! use ledgerflow_command::dispatch::CommandDispatcher;
//! use ledgerflow_command::store::memory::InMemoryIdempotencyStore;
//!
//! # async fn example(handler: &dyn ledgerflow_command::dispatch::CommandHandler)
//! # -> ledgerflow_command::error::Result<()> {
//! let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
//!
//! let command = CommandDescriptor::new("LOAN", "DISBURSE")
//!     .with_resource_id(55.into())
//!     .with_idempotency_key("client-token-abc".parse().unwrap());
//!
//! let outcome = dispatcher.dispatch(&command, handler).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod record;
pub mod store;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::classify::{classify, ClassifiedFailure, FailureKind, HandlerFailure};
    pub use crate::command::CommandDescriptor;
    pub use crate::dispatch::{
        CommandDispatcher, CommandHandler, DispatchOutcome, HandlerResponse,
    };
    pub use crate::error::{Error, Result};
    pub use crate::record::{IdempotencyRecord, RecordState};
    pub use crate::store::memory::InMemoryIdempotencyStore;
    pub use crate::store::{IdempotencyStore, ReserveOutcome};
}
