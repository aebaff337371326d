//! Postgres-backed collaborators.
//!
//! `PgWorkItemStore` writes work items and tasks straight into `work_items`.
//! `PgOutbox` records every other effect in `automation_outbox`; separate
//! delivery workers send the mail, post the chat message, and so on.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use effects::{
    ChatMessage, ChatNotifier, EffectError, Effects, EmailMessage, EntityRef, EntityStore,
    ExecutionContext, Mailer, NewTask, NewWorkItem, PaymentRequest, PaymentRequests,
    WorkItemOutcome, WorkItemStore,
};

use crate::repository::{outbox, work_items};
use crate::{DbError, DbPool};

#[derive(Clone)]
pub struct PgWorkItemStore {
    pool: DbPool,
}

impl PgWorkItemStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkItemStore for PgWorkItemStore {
    async fn create_work_item(
        &self,
        ctx: &ExecutionContext,
        item: NewWorkItem,
    ) -> Result<WorkItemOutcome, EffectError> {
        let outcome = work_items::insert_work_item(&self.pool, ctx.org_id, ctx.event_id, &item).await?;
        debug!("work item {:?} for key {:?}", outcome, item.dedupe_key);
        Ok(outcome)
    }

    async fn create_task(&self, ctx: &ExecutionContext, task: NewTask) -> Result<Uuid, EffectError> {
        Ok(work_items::insert_task(&self.pool, ctx.org_id, ctx.event_id, &task).await?)
    }
}

#[derive(Clone)]
pub struct PgOutbox {
    pool: DbPool,
}

impl PgOutbox {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn push(
        &self,
        ctx: &ExecutionContext,
        effect: &str,
        payload: impl Serialize,
    ) -> Result<Uuid, EffectError> {
        let payload = serde_json::to_value(payload).map_err(DbError::from)?;
        let id = outbox::enqueue(&self.pool, ctx.org_id, ctx.event_id, effect, payload).await?;
        debug!("queued {} as outbox row {}", effect, id);
        Ok(id)
    }
}

#[async_trait]
impl Mailer for PgOutbox {
    async fn send_email(
        &self,
        ctx: &ExecutionContext,
        message: EmailMessage,
    ) -> Result<String, EffectError> {
        self.push(ctx, "send_email", message).await.map(|id| id.to_string())
    }
}

#[async_trait]
impl ChatNotifier for PgOutbox {
    async fn notify(&self, ctx: &ExecutionContext, message: ChatMessage) -> Result<(), EffectError> {
        self.push(ctx, "slack_notify", message).await.map(drop)
    }
}

#[async_trait]
impl EntityStore for PgOutbox {
    async fn add_tag(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        tag: &str,
    ) -> Result<(), EffectError> {
        self.push(ctx, "add_tag", json!({ "entity": entity, "tag": tag })).await.map(drop)
    }

    async fn update_field(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        field: &str,
        value: Value,
    ) -> Result<(), EffectError> {
        self.push(ctx, "update_field", json!({ "entity": entity, "field": field, "value": value }))
            .await
            .map(drop)
    }

    async fn update_status(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        status: &str,
    ) -> Result<(), EffectError> {
        self.push(ctx, "update_status", json!({ "entity": entity, "status": status }))
            .await
            .map(drop)
    }

    async fn assign_reviewer(
        &self,
        ctx: &ExecutionContext,
        entity: &EntityRef,
        reviewer: &str,
    ) -> Result<(), EffectError> {
        self.push(ctx, "assign_reviewer", json!({ "entity": entity, "reviewer": reviewer }))
            .await
            .map(drop)
    }
}

#[async_trait]
impl PaymentRequests for PgOutbox {
    async fn create_payment_request(
        &self,
        ctx: &ExecutionContext,
        request: PaymentRequest,
    ) -> Result<Uuid, EffectError> {
        self.push(ctx, "create_payment_request", request).await
    }
}

/// Wire every collaborator port to Postgres.
pub fn pg_effects(pool: DbPool) -> Effects {
    let outbox = Arc::new(PgOutbox::new(pool.clone()));
    Effects {
        mailer: outbox.clone(),
        work_items: Arc::new(PgWorkItemStore::new(pool)),
        chat: outbox.clone(),
        entities: outbox.clone(),
        payments: outbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_database_errors_are_retryable() {
        let timed_out: EffectError = DbError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(timed_out.is_retryable());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let reset: EffectError = DbError::Sqlx(sqlx::Error::Io(io)).into();
        assert!(reset.is_retryable());
    }

    #[test]
    fn data_errors_are_fatal() {
        let missing: EffectError = DbError::NotFound.into();
        assert_eq!(missing, EffectError::Fatal("row not found".into()));

        let decode: EffectError = DbError::Sqlx(sqlx::Error::RowNotFound).into();
        assert!(!decode.is_retryable());
    }
}
