//! The command dispatcher: at-most-once execution per idempotency key.
//!
//! The dispatcher sits between the API layer (which builds command
//! descriptors) and the business handlers (which perform the actual
//! mutation). For a keyed command it:
//!
//! 1. Atomically reserves the key in the idempotency store
//! 2. Runs the handler only if the reservation was won
//! 3. Records the terminal outcome so duplicates replay it unchanged
//! 4. Rejects concurrent duplicates fast while the first execution runs
//!
//! Commands without a key bypass the store entirely and execute directly.
//!
//! ## Outcome, not exceptions
//!
//! Every terminal result is returned by value as a [`DispatchOutcome`],
//! making the state machine explicit and testable. Only infrastructure
//! failures of the store itself surface as `Err`; they are never folded
//! into the idempotency taxonomy.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use ledgerflow_core::{CommandId, IdempotencyKey};

use crate::classify::{classify, ClassifiedFailure, FailureKind, HandlerFailure};
use crate::command::CommandDescriptor;
use crate::error::Result;
use crate::metrics::CommandMetrics;
use crate::record::RecordState;
use crate::store::{IdempotencyStore, ReserveOutcome};

/// A successful handler response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// HTTP-style status to surface (typically 200).
    pub status: u16,
    /// Result payload to surface.
    pub body: Value,
}

impl HandlerResponse {
    /// Creates a 200 response with the given body.
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// Trait for business command handlers.
///
/// The real loan/savings/accounting logic lives behind this seam, out of
/// scope for the coordination core. Handlers are registered by the
/// surrounding application, not hard-coded here.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Executes the command and returns its result or a typed failure.
    async fn handle(
        &self,
        command: &CommandDescriptor,
    ) -> std::result::Result<HandlerResponse, HandlerFailure>;
}

/// Terminal result of a dispatch call.
///
/// `replayed` is true when the outcome was served from the idempotency
/// cache; the REST layer uses it to set the cache-marker response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran (or previously ran) to success.
    Succeeded {
        /// HTTP-style status to surface.
        status: u16,
        /// Result payload, byte-identical on replay.
        body: Value,
        /// True if served from the idempotency cache.
        replayed: bool,
    },
    /// The handler failed terminally, freshly classified or replayed.
    Failed {
        /// Which taxonomy bucket the failure landed in.
        kind: FailureKind,
        /// HTTP-style status to surface.
        status: u16,
        /// Error payload, byte-identical on replay.
        body: Value,
        /// True if served from the idempotency cache.
        replayed: bool,
    },
    /// A concurrent execution holds the key in flight; retry later.
    ///
    /// Fail-fast by design: the dispatcher never blocks waiting on the
    /// other execution and never runs the handler a second time.
    StillProcessing {
        /// The contested idempotency key.
        key: IdempotencyKey,
    },
}

impl DispatchOutcome {
    /// Returns true if the command succeeded (fresh or replayed).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Returns true if the outcome was served from the idempotency cache.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { replayed: true, .. } | Self::Failed { replayed: true, .. }
        )
    }

    /// Returns the HTTP-style status for this outcome.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Succeeded { status, .. } | Self::Failed { status, .. } => *status,
            Self::StillProcessing { .. } => crate::wire::STATUS_STILL_PROCESSING,
        }
    }

    /// Returns the payload for this outcome, if one exists.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        match self {
            Self::Succeeded { body, .. } | Self::Failed { body, .. } => Some(body),
            Self::StillProcessing { .. } => None,
        }
    }

    /// Returns the label value used in metrics for this outcome.
    #[must_use]
    const fn metric_label(&self) -> &'static str {
        match self {
            Self::Succeeded { replayed: false, .. } => "executed",
            Self::Succeeded { replayed: true, .. } => "replayed_success",
            Self::Failed { replayed: false, .. } => "failed",
            Self::Failed { replayed: true, .. } => "replayed_failure",
            Self::StillProcessing { .. } => "still_processing",
        }
    }
}

/// Dispatches write commands with at-most-once execution per key.
///
/// Generic over the store so tests run against
/// [`InMemoryIdempotencyStore`](crate::store::memory::InMemoryIdempotencyStore)
/// and production can inject a database-backed implementation.
#[derive(Debug)]
pub struct CommandDispatcher<S> {
    store: S,
    metrics: CommandMetrics,
}

impl<S> CommandDispatcher<S> {
    /// Creates a dispatcher over the given idempotency store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            metrics: CommandMetrics::new(),
        }
    }

    /// Returns a reference to the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: IdempotencyStore> CommandDispatcher<S> {
    /// Dispatches a command through the idempotency state machine.
    ///
    /// Without a key the handler executes directly with no caching. With a
    /// key, the handler body runs exactly once across any number of
    /// concurrent or retried calls; duplicates observe a replay or
    /// [`DispatchOutcome::StillProcessing`].
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level infrastructure failures; those
    /// are fatal to the call and surfaced as a generic server error by the
    /// REST layer. Note the handler may already have executed when the
    /// terminal write fails; the record is left in flight and the caller
    /// will observe `StillProcessing` until the record expires.
    pub async fn dispatch(
        &self,
        command: &CommandDescriptor,
        handler: &dyn CommandHandler,
    ) -> Result<DispatchOutcome> {
        debug!(
            command_id = %command.command_id(),
            command = %command.full_action(),
            "dispatching command"
        );

        let Some(key) = command.idempotency_key() else {
            let outcome = self.execute(command, handler).await;
            self.metrics.record_dispatch(outcome.metric_label());
            return Ok(outcome);
        };

        let outcome = match self.store.reserve(key, command.command_id(), Utc::now()).await? {
            ReserveOutcome::Reserved => {
                let outcome = self.execute(command, handler).await;
                self.record_terminal(key, command.command_id(), &outcome)
                    .await?;
                outcome
            }
            ReserveOutcome::StillInFlight => {
                warn!(
                    command_id = %command.command_id(),
                    %key,
                    "duplicate command while original still processing"
                );
                DispatchOutcome::StillProcessing { key: key.clone() }
            }
            ReserveOutcome::Replay(record) => {
                debug!(
                    command_id = %command.command_id(),
                    %key,
                    state = %record.state,
                    "replaying cached outcome"
                );
                let status = record.http_status.unwrap_or(crate::wire::STATUS_INTERNAL);
                let body = record.body.unwrap_or(Value::Null);
                match record.state {
                    RecordState::Succeeded => DispatchOutcome::Succeeded {
                        status,
                        body,
                        replayed: true,
                    },
                    // InFlight records never reach here; the store reports
                    // them as StillInFlight.
                    RecordState::Failed | RecordState::InFlight => DispatchOutcome::Failed {
                        kind: FailureKind::from_status(status),
                        status,
                        body,
                        replayed: true,
                    },
                }
            }
        };

        self.metrics.record_dispatch(outcome.metric_label());
        Ok(outcome)
    }

    /// Runs the handler and classifies its result. Never touches the store.
    async fn execute(
        &self,
        command: &CommandDescriptor,
        handler: &dyn CommandHandler,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let result = handler.handle(command).await;
        self.metrics
            .observe_handler_duration(&command.full_action(), started.elapsed().as_secs_f64());

        match result {
            Ok(response) => DispatchOutcome::Succeeded {
                status: response.status,
                body: response.body,
                replayed: false,
            },
            Err(failure) => {
                let ClassifiedFailure {
                    kind,
                    http_status,
                    body,
                } = classify(&failure);
                DispatchOutcome::Failed {
                    kind,
                    status: http_status,
                    body,
                    replayed: false,
                }
            }
        }
    }

    /// Writes the freshly computed terminal outcome back to the store.
    async fn record_terminal(
        &self,
        key: &IdempotencyKey,
        owner: CommandId,
        outcome: &DispatchOutcome,
    ) -> Result<()> {
        match outcome {
            DispatchOutcome::Succeeded { status, body, .. } => {
                self.store
                    .complete(key, owner, RecordState::Succeeded, *status, body.clone())
                    .await
            }
            DispatchOutcome::Failed { status, body, .. } => {
                self.store
                    .complete(key, owner, RecordState::Failed, *status, body.clone())
                    .await
            }
            DispatchOutcome::StillProcessing { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryIdempotencyStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        result: std::result::Result<HandlerResponse, fn() -> HandlerFailure>,
    }

    impl CountingHandler {
        fn succeeding(body: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(HandlerResponse::ok(body)),
            }
        }

        fn failing(make: fn() -> HandlerFailure) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(make),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandHandler for CountingHandler {
        async fn handle(
            &self,
            _command: &CommandDescriptor,
        ) -> std::result::Result<HandlerResponse, HandlerFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(response) => Ok(response.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn keyed_command(key: &str) -> CommandDescriptor {
        CommandDescriptor::new("LOAN", "DISBURSE")
            .with_resource_id(55.into())
            .with_idempotency_key(key.parse().unwrap())
    }

    #[tokio::test]
    async fn keyless_command_executes_without_caching() {
        let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
        let handler = CountingHandler::succeeding(json!({"id": 1}));
        let command = CommandDescriptor::new("LOAN", "APPROVE");

        let first = dispatcher.dispatch(&command, &handler).await.unwrap();
        let second = dispatcher.dispatch(&command, &handler).await.unwrap();

        assert_eq!(handler.calls(), 2);
        assert!(!first.is_replay());
        assert!(!second.is_replay());
        assert_eq!(dispatcher.store().record_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn keyed_success_replays_identically() {
        let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
        let handler = CountingHandler::succeeding(json!({"id": 55, "status": "DISBURSED"}));
        let command = keyed_command("abc");

        let first = dispatcher.dispatch(&command, &handler).await.unwrap();
        let second = dispatcher.dispatch(&command, &handler).await.unwrap();
        let third = dispatcher.dispatch(&command, &handler).await.unwrap();

        assert_eq!(handler.calls(), 1);
        assert!(!first.is_replay());
        assert!(second.is_replay());
        assert!(third.is_replay());
        assert_eq!(first.body(), second.body());
        assert_eq!(second.body(), third.body());
        assert_eq!(second.status(), 200);
    }

    #[tokio::test]
    async fn keyed_failure_is_cached_and_never_resurrects() {
        let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
        let failing = CountingHandler::failing(|| HandlerFailure::Domain {
            status: 403,
            body: json!({"code": "error.loan.not.approved"}),
        });
        let command = keyed_command("abc");

        let first = dispatcher.dispatch(&command, &failing).await.unwrap();
        assert!(matches!(
            first,
            DispatchOutcome::Failed {
                kind: FailureKind::Business,
                status: 403,
                replayed: false,
                ..
            }
        ));

        // A later retry with a now-succeeding handler still replays the failure.
        let succeeding = CountingHandler::succeeding(json!({"id": 55}));
        let replay = dispatcher.dispatch(&command, &succeeding).await.unwrap();
        assert!(matches!(
            replay,
            DispatchOutcome::Failed {
                status: 403,
                replayed: true,
                ..
            }
        ));
        assert_eq!(succeeding.calls(), 0);
    }

    #[tokio::test]
    async fn conflict_failures_map_to_409() {
        let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
        let handler = CountingHandler::failing(|| HandlerFailure::VersionConflict {
            message: "stale loan version".into(),
        });

        let outcome = dispatcher
            .dispatch(&keyed_command("abc"), &handler)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                kind: FailureKind::Conflict,
                status: 409,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn still_processing_status_is_425() {
        let key: IdempotencyKey = "abc".parse().unwrap();
        let outcome = DispatchOutcome::StillProcessing { key };
        assert_eq!(outcome.status(), 425);
        assert!(outcome.body().is_none());
        assert!(!outcome.is_success());
        assert!(!outcome.is_replay());
    }
}
