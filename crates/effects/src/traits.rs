//! Collaborator traits and the request-scoped execution context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::requests::{
    ChatMessage, EmailMessage, EntityRef, NewTask, NewWorkItem, PaymentRequest, WorkItemOutcome,
};
use crate::EffectError;

/// Request-scoped context passed to every collaborator call.
///
/// Defined here (in the effects crate) so both the engine and collaborator
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Organization the event belongs to. Every write is scoped by it.
    pub org_id: Uuid,
    /// Staff user who caused the event, when there is one.
    pub actor_id: Option<Uuid>,
    /// ID of the triggering event.
    pub event_id: Uuid,
    /// Name of the triggering event, e.g. `donation.created`.
    pub event_type: String,
    /// Render everything but call no collaborator.
    #[serde(default)]
    pub dry_run: bool,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hand the message to the mail provider, returning its message id.
    async fn send_email(
        &self,
        ctx: &ExecutionContext,
        message: EmailMessage,
    ) -> Result<String, EffectError>;
}

/// Store for staff work items and tasks.
///
/// Implementations must make `create_work_item` atomic with respect to the
/// dedupe key: two concurrent calls with the same `(org_id, dedupe_key)`
/// create exactly one row and the loser gets [`WorkItemOutcome::Existing`].
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn create_work_item(
        &self,
        ctx: &ExecutionContext,
        item: NewWorkItem,
    ) -> Result<WorkItemOutcome, EffectError>;

    async fn create_task(&self, ctx: &ExecutionContext, task: NewTask)
        -> Result<Uuid, EffectError>;
}

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, ctx: &ExecutionContext, message: ChatMessage)
        -> Result<(), EffectError>;
}

/// Mutations on tagged product entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn add_tag(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        tag: &str,
    ) -> Result<(), EffectError>;

    async fn update_field(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        field: &str,
        value: Value,
    ) -> Result<(), EffectError>;

    async fn update_status(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        status: &str,
    ) -> Result<(), EffectError>;

    /// Assign a reviewer. `reviewer` is either a user id or a role name,
    /// depending on what the action named.
    async fn assign_reviewer(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        reviewer: &str,
    ) -> Result<(), EffectError>;
}

#[async_trait]
pub trait PaymentRequests: Send + Sync {
    async fn create_payment_request(
        &self,
        ctx: &ExecutionContext,
        request: PaymentRequest,
    ) -> Result<Uuid, EffectError>;
}

/// The full set of collaborators an executor needs.
#[derive(Clone)]
pub struct Effects {
    pub mailer: Arc<dyn Mailer>,
    pub work_items: Arc<dyn WorkItemStore>,
    pub chat: Arc<dyn ChatNotifier>,
    pub entities: Arc<dyn EntityStore>,
    pub payments: Arc<dyn PaymentRequests>,
}

impl Effects {
    /// Use one value for every port.
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: Mailer + WorkItemStore + ChatNotifier + EntityStore + PaymentRequests + 'static,
    {
        Self {
            mailer: shared.clone(),
            work_items: shared.clone(),
            chat: shared.clone(),
            entities: shared.clone(),
            payments: shared,
        }
    }
}

impl std::fmt::Debug for Effects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effects").finish_non_exhaustive()
    }
}
