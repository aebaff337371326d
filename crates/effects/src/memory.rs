//! `InMemoryEffects`: a recording implementation of every collaborator port.
//!
//! Used by the test suites and by the CLI when dispatching without a
//! database. Failures can be scripted per port to exercise retry and
//! `stop_on_error` handling.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::requests::{
    ChatMessage, EmailMessage, EntityRef, NewTask, NewWorkItem, PaymentRequest, WorkItemOutcome,
};
use crate::traits::{
    ChatNotifier, EntityStore, ExecutionContext, Mailer, PaymentRequests, WorkItemStore,
};
use crate::EffectError;

/// Which port a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Mail,
    WorkItems,
    Tasks,
    Chat,
    Entities,
    Payments,
}

/// A recorded entity mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntityOp {
    AddTag { entity: EntityRef, tag: String },
    UpdateField { entity: EntityRef, field: String, value: Value },
    UpdateStatus { entity: EntityRef, status: String },
    AssignReviewer { entity: EntityRef, reviewer: String },
}

/// A stored work item together with the org it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredWorkItem {
    pub id: Uuid,
    pub org_id: Uuid,
    pub item: NewWorkItem,
}

#[derive(Default)]
struct WorkItemTable {
    rows: Vec<StoredWorkItem>,
    by_dedupe_key: HashMap<(Uuid, String), Uuid>,
}

#[derive(Default)]
struct Failures {
    next: HashMap<Port, VecDeque<EffectError>>,
    always: HashMap<Port, EffectError>,
}

/// Records every call it receives. Thread-safe; share it behind an `Arc`.
#[derive(Default)]
pub struct InMemoryEffects {
    emails: Mutex<Vec<EmailMessage>>,
    work_items: Mutex<WorkItemTable>,
    tasks: Mutex<Vec<NewTask>>,
    chat: Mutex<Vec<ChatMessage>>,
    entity_ops: Mutex<Vec<EntityOp>>,
    payments: Mutex<Vec<PaymentRequest>>,
    failures: Mutex<Failures>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not hide the recorded calls from the others.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call on `port` fail with `error`. Calls queue up.
    pub fn fail_next(&self, port: Port, error: EffectError) {
        lock(&self.failures).next.entry(port).or_default().push_back(error);
    }

    /// Make every call on `port` fail with `error` until [`Self::heal`].
    pub fn fail_always(&self, port: Port, error: EffectError) {
        lock(&self.failures).always.insert(port, error);
    }

    /// Clear every scripted failure.
    pub fn heal(&self) {
        let mut failures = lock(&self.failures);
        failures.next.clear();
        failures.always.clear();
    }

    fn check(&self, port: Port) -> Result<(), EffectError> {
        let mut failures = lock(&self.failures);
        if let Some(err) = failures.next.get_mut(&port).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        match failures.always.get(&port) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn emails(&self) -> Vec<EmailMessage> {
        lock(&self.emails).clone()
    }

    pub fn work_items(&self) -> Vec<StoredWorkItem> {
        lock(&self.work_items).rows.clone()
    }

    pub fn tasks(&self) -> Vec<NewTask> {
        lock(&self.tasks).clone()
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        lock(&self.chat).clone()
    }

    pub fn entity_ops(&self) -> Vec<EntityOp> {
        lock(&self.entity_ops).clone()
    }

    pub fn payment_requests(&self) -> Vec<PaymentRequest> {
        lock(&self.payments).clone()
    }

    /// Total number of effects recorded across all ports.
    pub fn call_count(&self) -> usize {
        lock(&self.emails).len()
            + lock(&self.work_items).rows.len()
            + lock(&self.tasks).len()
            + lock(&self.chat).len()
            + lock(&self.entity_ops).len()
            + lock(&self.payments).len()
    }
}

#[async_trait]
impl Mailer for InMemoryEffects {
    async fn send_email(
        &self,
        _ctx: &ExecutionContext,
        message: EmailMessage,
    ) -> Result<String, EffectError> {
        self.check(Port::Mail)?;
        let mut emails = lock(&self.emails);
        emails.push(message);
        Ok(format!("mem-{}", emails.len()))
    }
}

#[async_trait]
impl WorkItemStore for InMemoryEffects {
    async fn create_work_item(
        &self,
        ctx: &ExecutionContext,
        item: NewWorkItem,
    ) -> Result<WorkItemOutcome, EffectError> {
        self.check(Port::WorkItems)?;
        let mut table = lock(&self.work_items);

        if let Some(key) = &item.dedupe_key {
            if let Some(existing) = table.by_dedupe_key.get(&(ctx.org_id, key.clone())) {
                return Ok(WorkItemOutcome::Existing(*existing));
            }
        }

        let id = Uuid::new_v4();
        if let Some(key) = &item.dedupe_key {
            table.by_dedupe_key.insert((ctx.org_id, key.clone()), id);
        }
        table.rows.push(StoredWorkItem { id, org_id: ctx.org_id, item });
        Ok(WorkItemOutcome::Created(id))
    }

    async fn create_task(
        &self,
        _ctx: &ExecutionContext,
        task: NewTask,
    ) -> Result<Uuid, EffectError> {
        self.check(Port::Tasks)?;
        lock(&self.tasks).push(task);
        Ok(Uuid::new_v4())
    }
}

#[async_trait]
impl ChatNotifier for InMemoryEffects {
    async fn notify(
        &self,
        _ctx: &ExecutionContext,
        message: ChatMessage,
    ) -> Result<(), EffectError> {
        self.check(Port::Chat)?;
        lock(&self.chat).push(message);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryEffects {
    async fn add_tag(
        &self,
        _ctx: &ExecutionContext,
        entity: &EntityRef,
        tag: &str,
    ) -> Result<(), EffectError> {
        self.check(Port::Entities)?;
        lock(&self.entity_ops).push(EntityOp::AddTag {
            entity: entity.clone(),
            tag: tag.to_owned(),
        });
        Ok(())
    }

    async fn update_field(
        &self,
        _ctx: &ExecutionContext,
        entity: &EntityRef,
        field: &str,
        value: Value,
    ) -> Result<(), EffectError> {
        self.check(Port::Entities)?;
        lock(&self.entity_ops).push(EntityOp::UpdateField {
            entity: entity.clone(),
            field: field.to_owned(),
            value,
        });
        Ok(())
    }

    async fn update_status(
        &self,
        _ctx: &ExecutionContext,
        entity: &EntityRef,
        status: &str,
    ) -> Result<(), EffectError> {
        self.check(Port::Entities)?;
        lock(&self.entity_ops).push(EntityOp::UpdateStatus {
            entity: entity.clone(),
            status: status.to_owned(),
        });
        Ok(())
    }

    async fn assign_reviewer(
        &self,
        _ctx: &ExecutionContext,
        entity: &EntityRef,
        reviewer: &str,
    ) -> Result<(), EffectError> {
        self.check(Port::Entities)?;
        lock(&self.entity_ops).push(EntityOp::AssignReviewer {
            entity: entity.clone(),
            reviewer: reviewer.to_owned(),
        });
        Ok(())
    }
}

#[async_trait]
impl PaymentRequests for InMemoryEffects {
    async fn create_payment_request(
        &self,
        _ctx: &ExecutionContext,
        request: PaymentRequest,
    ) -> Result<Uuid, EffectError> {
        self.check(Port::Payments)?;
        lock(&self.payments).push(request);
        Ok(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;

    fn ctx(org_id: Uuid) -> ExecutionContext {
        ExecutionContext {
            org_id,
            actor_id: None,
            event_id: Uuid::new_v4(),
            event_type: "grant.report_due".into(),
            dry_run: false,
        }
    }

    fn item(key: Option<&str>) -> NewWorkItem {
        NewWorkItem {
            title: "Submit report".into(),
            description: None,
            assignee_id: None,
            priority: Priority::High,
            due_on: None,
            dedupe_key: key.map(str::to_owned),
            source_recipe: "Grant Report Reminder".into(),
        }
    }

    #[tokio::test]
    async fn dedupe_key_creates_one_row_per_org() {
        let effects = InMemoryEffects::new();
        let org = Uuid::new_v4();

        let first = effects.create_work_item(&ctx(org), item(Some("k1"))).await.unwrap();
        let second = effects.create_work_item(&ctx(org), item(Some("k1"))).await.unwrap();

        assert!(matches!(first, WorkItemOutcome::Created(_)));
        assert_eq!(second, WorkItemOutcome::Existing(first.id()));
        assert_eq!(effects.work_items().len(), 1);

        // Same key, different org: a separate row.
        let other = effects
            .create_work_item(&ctx(Uuid::new_v4()), item(Some("k1")))
            .await
            .unwrap();
        assert!(matches!(other, WorkItemOutcome::Created(_)));
        assert_eq!(effects.work_items().len(), 2);
    }

    #[tokio::test]
    async fn items_without_key_are_never_deduplicated() {
        let effects = InMemoryEffects::new();
        let org = Uuid::new_v4();
        effects.create_work_item(&ctx(org), item(None)).await.unwrap();
        effects.create_work_item(&ctx(org), item(None)).await.unwrap();
        assert_eq!(effects.work_items().len(), 2);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let effects = InMemoryEffects::new();
        let c = ctx(Uuid::new_v4());
        let msg = ChatMessage { channel: "#grants".into(), text: "hi".into() };

        effects.fail_next(Port::Chat, EffectError::Retryable("timeout".into()));
        assert_eq!(
            effects.notify(&c, msg.clone()).await,
            Err(EffectError::Retryable("timeout".into()))
        );
        assert!(effects.notify(&c, msg.clone()).await.is_ok());

        effects.fail_always(Port::Chat, EffectError::Fatal("webhook revoked".into()));
        assert!(effects.notify(&c, msg.clone()).await.is_err());
        assert!(effects.notify(&c, msg.clone()).await.is_err());

        effects.heal();
        assert!(effects.notify(&c, msg).await.is_ok());
        assert_eq!(effects.chat_messages().len(), 2);
    }
}
