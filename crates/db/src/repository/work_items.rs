//! `work_items` repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use effects::{NewTask, NewWorkItem, Priority, WorkItemOutcome};

use crate::DbError;

/// Insert a work item unless one with the same `(org_id, dedupe_key)` exists.
///
/// The unique index makes this safe under concurrent deliveries of the
/// same event: exactly one insert wins, the others read the winner's id.
pub async fn insert_work_item(
    pool: &PgPool,
    org_id: Uuid,
    event_id: Uuid,
    item: &NewWorkItem,
) -> Result<WorkItemOutcome, DbError> {
    let created: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO work_items
            (id, org_id, kind, title, description, assignee_id, priority, due_on,
             dedupe_key, source_recipe, source_event_id, created_at)
        VALUES ($1, $2, 'work_item', $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (org_id, dedupe_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.assignee_id)
    .bind(item.priority.to_string())
    .bind(item.due_on)
    .bind(&item.dedupe_key)
    .bind(&item.source_recipe)
    .bind(event_id)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    if let Some(id) = created {
        return Ok(WorkItemOutcome::Created(id));
    }

    // Conflicts only happen when a key is present.
    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM work_items WHERE org_id = $1 AND dedupe_key = $2",
    )
    .bind(org_id)
    .bind(&item.dedupe_key)
    .fetch_optional(pool)
    .await?;

    existing.map(WorkItemOutcome::Existing).ok_or(DbError::NotFound)
}

/// Insert a task. Tasks share the table but never carry a dedupe key.
pub async fn insert_task(
    pool: &PgPool,
    org_id: Uuid,
    event_id: Uuid,
    task: &NewTask,
) -> Result<Uuid, DbError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO work_items
            (id, org_id, kind, title, assignee_id, priority, due_on,
             source_recipe, source_event_id, created_at)
        VALUES ($1, $2, 'task', $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(&task.title)
    .bind(&task.assignee_id)
    .bind(Priority::Normal.to_string())
    .bind(task.due_on)
    .bind(&task.source_recipe)
    .bind(event_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}
