//! Integration tests for the command dispatcher.
//!
//! Covers the externally observable guarantees: at-most-once execution
//! under concurrency, replay fidelity, failure caching, and fail-fast on
//! in-flight duplicates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use ledgerflow_command::classify::HandlerFailure;
use ledgerflow_command::command::CommandDescriptor;
use ledgerflow_command::dispatch::{
    CommandDispatcher, CommandHandler, DispatchOutcome, HandlerResponse,
};
use ledgerflow_command::store::memory::InMemoryIdempotencyStore;
use ledgerflow_core::IdempotencyKey;

/// A handler that records how many times its body ran and can be slowed
/// down to hold the key in flight.
struct DisbursementHandler {
    executions: AtomicUsize,
    delay: Duration,
    body: Value,
}

impl DisbursementHandler {
    fn new(body: Value) -> Self {
        Self {
            executions: AtomicUsize::new(0),
            delay: Duration::ZERO,
            body,
        }
    }

    fn slow(body: Value, delay: Duration) -> Self {
        Self {
            executions: AtomicUsize::new(0),
            delay,
            body,
        }
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for DisbursementHandler {
    async fn handle(
        &self,
        _command: &CommandDescriptor,
    ) -> Result<HandlerResponse, HandlerFailure> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(HandlerResponse::ok(self.body.clone()))
    }
}

fn disburse_command(key: &str) -> CommandDescriptor {
    CommandDescriptor::new("LOAN", "DISBURSE")
        .with_resource_id(55.into())
        .with_payload(json!({"transactionAmount": 1000}))
        .with_idempotency_key(key.parse::<IdempotencyKey>().unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_execute_handler_exactly_once() {
    let dispatcher = Arc::new(CommandDispatcher::new(InMemoryIdempotencyStore::new()));
    let handler = Arc::new(DisbursementHandler::new(json!({"id": 55})));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let dispatcher = Arc::clone(&dispatcher);
        let handler = Arc::clone(&handler);
        tasks.spawn(async move {
            let command = disburse_command("concurrent-key");
            dispatcher.dispatch(&command, handler.as_ref()).await
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.unwrap().unwrap());
    }

    // The handler body ran exactly once; every caller got either the
    // terminal payload or a fail-fast still-processing outcome.
    assert_eq!(handler.executions(), 1);
    for outcome in &outcomes {
        match outcome {
            DispatchOutcome::Succeeded { body, .. } => assert_eq!(body, &json!({"id": 55})),
            DispatchOutcome::StillProcessing { .. } => {}
            DispatchOutcome::Failed { .. } => panic!("unexpected failure: {outcome:?}"),
        }
    }
    assert!(outcomes.iter().any(DispatchOutcome::is_success));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_during_slow_execution_fails_fast() {
    let dispatcher = Arc::new(CommandDispatcher::new(InMemoryIdempotencyStore::new()));
    let handler = Arc::new(DisbursementHandler::slow(
        json!({"id": 55}),
        Duration::from_millis(400),
    ));

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let command = disburse_command("slow-key");
            dispatcher.dispatch(&command, handler.as_ref()).await
        })
    };

    // Let the first call take the reservation, then issue the duplicate.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let duplicate = dispatcher
        .dispatch(&disburse_command("slow-key"), handler.as_ref())
        .await
        .unwrap();

    assert!(matches!(duplicate, DispatchOutcome::StillProcessing { .. }));
    assert_eq!(duplicate.status(), 425);

    let first = first.await.unwrap().unwrap();
    assert!(first.is_success());
    assert!(!first.is_replay());
    // No duplicate disbursement happened.
    assert_eq!(handler.executions(), 1);
}

#[tokio::test]
async fn replay_returns_identical_payload_any_number_of_times() {
    let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
    let handler = DisbursementHandler::new(json!({"id": 55, "changes": {"status": "ACTIVE"}}));

    let original = dispatcher
        .dispatch(&disburse_command("replay-key"), &handler)
        .await
        .unwrap();

    for _ in 0..5 {
        let replay = dispatcher
            .dispatch(&disburse_command("replay-key"), &handler)
            .await
            .unwrap();
        assert!(replay.is_replay());
        assert_eq!(replay.status(), original.status());
        assert_eq!(replay.body(), original.body());
    }
    assert_eq!(handler.executions(), 1);
}

#[tokio::test]
async fn distinct_keys_are_independent_executions() {
    let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());
    let handler = DisbursementHandler::new(json!({"id": 55}));

    let a = dispatcher
        .dispatch(&disburse_command("key-a"), &handler)
        .await
        .unwrap();
    let b = dispatcher
        .dispatch(&disburse_command("key-b"), &handler)
        .await
        .unwrap();

    assert_eq!(handler.executions(), 2);
    assert!(!a.is_replay());
    assert!(!b.is_replay());
}

struct RejectingHandler;

#[async_trait]
impl CommandHandler for RejectingHandler {
    async fn handle(
        &self,
        _command: &CommandDescriptor,
    ) -> Result<HandlerResponse, HandlerFailure> {
        Err(HandlerFailure::Domain {
            status: 400,
            body: json!({"code": "error.loan.already.disbursed"}),
        })
    }
}

#[tokio::test]
async fn cached_failure_replays_with_original_status() {
    let dispatcher = CommandDispatcher::new(InMemoryIdempotencyStore::new());

    let first = dispatcher
        .dispatch(&disburse_command("fail-key"), &RejectingHandler)
        .await
        .unwrap();
    assert_eq!(first.status(), 400);
    assert!(!first.is_replay());

    // Even a handler that would now succeed is never consulted.
    let would_succeed = DisbursementHandler::new(json!({"id": 55}));
    let replay = dispatcher
        .dispatch(&disburse_command("fail-key"), &would_succeed)
        .await
        .unwrap();

    assert_eq!(replay.status(), 400);
    assert!(replay.is_replay());
    assert!(!replay.is_success());
    assert_eq!(would_succeed.executions(), 0);
}
