//! `automation_outbox` repository functions.
//!
//! Delivery workers claim pending rows with `FOR UPDATE SKIP LOCKED` so
//! several of them can poll at once.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::OutboxRow};

/// Queue one effect for delivery.
pub async fn enqueue(
    pool: &PgPool,
    org_id: Uuid,
    event_id: Uuid,
    effect: &str,
    payload: serde_json::Value,
) -> Result<Uuid, DbError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO automation_outbox (id, org_id, event_id, effect, payload, status, created_at)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(event_id)
    .bind(effect)
    .bind(payload)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Claim up to `limit` pending rows and mark them `delivering`.
pub async fn claim_pending(pool: &PgPool, limit: i64) -> Result<Vec<OutboxRow>, DbError> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, OutboxRow>(
        r#"
        SELECT id, org_id, event_id, effect, payload, status, created_at
        FROM automation_outbox
        WHERE status = 'pending'
        ORDER BY created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    if !ids.is_empty() {
        sqlx::query("UPDATE automation_outbox SET status = 'delivering' WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(rows)
}

/// Mark a claimed row as delivered.
pub async fn mark_delivered(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE automation_outbox SET status = 'delivered' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
