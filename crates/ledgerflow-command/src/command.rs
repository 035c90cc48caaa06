//! The command descriptor: one write intent against a domain entity.
//!
//! Descriptors are built by the external API layer per inbound write
//! request and consumed once by the dispatcher. They are immutable after
//! construction; the builder methods consume and return the value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ledgerflow_core::{CommandId, EntityId, IdempotencyKey};

/// An immutable description of one write request.
///
/// Carries the target entity, the action to perform, optional resource
/// identifiers, the raw request payload, and the optional client-supplied
/// idempotency key.
///
/// ## Example
///
/// ```rust
/// use ledgerflow_command::command::CommandDescriptor;
///
/// let command = CommandDescriptor::new("LOAN", "DISBURSE")
///     .with_resource_id(55.into())
///     .with_payload(serde_json::json!({"transactionAmount": 1000}));
///
/// assert_eq!(command.full_action(), "LOAN.DISBURSE");
/// assert!(command.idempotency_key().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    /// Unique identifier for this dispatch, used for log correlation.
    command_id: CommandId,
    /// Domain entity the command targets (e.g. `"LOAN"`, `"SAVINGSACCOUNT"`).
    entity_name: String,
    /// Action to perform (e.g. `"DISBURSE"`, `"APPROVE"`, `"REPAYMENT"`).
    action: String,
    /// Primary resource identifier, if the action targets an existing record.
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<EntityId>,
    /// Nested resource identifier (e.g. a transaction under a loan).
    #[serde(skip_serializing_if = "Option::is_none")]
    subresource_id: Option<EntityId>,
    /// Raw request payload, passed through to the handler untouched.
    payload: Value,
    /// Client-supplied idempotency key, if the request is retry-safe.
    #[serde(skip_serializing_if = "Option::is_none")]
    idempotency_key: Option<IdempotencyKey>,
    /// When the descriptor was built.
    created_at: DateTime<Utc>,
}

impl CommandDescriptor {
    /// Creates a descriptor for the given entity and action.
    ///
    /// A fresh [`CommandId`] is generated for correlation. Payload defaults
    /// to JSON `null`; resource ids and the idempotency key are absent.
    #[must_use]
    pub fn new(entity_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            command_id: CommandId::generate(),
            entity_name: entity_name.into(),
            action: action.into(),
            resource_id: None,
            subresource_id: None,
            payload: Value::Null,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the primary resource identifier.
    #[must_use]
    pub const fn with_resource_id(mut self, id: EntityId) -> Self {
        self.resource_id = Some(id);
        self
    }

    /// Sets the nested resource identifier.
    #[must_use]
    pub const fn with_subresource_id(mut self, id: EntityId) -> Self {
        self.subresource_id = Some(id);
        self
    }

    /// Sets the raw request payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attaches a client-supplied idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Returns the dispatch correlation identifier.
    #[must_use]
    pub const fn command_id(&self) -> CommandId {
        self.command_id
    }

    /// Returns the target entity name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the primary resource identifier, if any.
    #[must_use]
    pub const fn resource_id(&self) -> Option<EntityId> {
        self.resource_id
    }

    /// Returns the nested resource identifier, if any.
    #[must_use]
    pub const fn subresource_id(&self) -> Option<EntityId> {
        self.subresource_id
    }

    /// Returns the raw request payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the idempotency key, if the client supplied one.
    #[must_use]
    pub const fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    /// Returns when the descriptor was built.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the `ENTITY.ACTION` pair used for log and metric labels.
    #[must_use]
    pub fn full_action(&self) -> String {
        format!("{}.{}", self.entity_name, self.action)
    }
}
