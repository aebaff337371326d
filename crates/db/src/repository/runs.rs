//! `automation_runs` repository functions.

use sqlx::PgPool;
use uuid::Uuid;

use engine::DispatchReport;

use crate::{DbError, models::AutomationRunRow};

/// Persist every run in `report`, one row per recipe.
pub async fn insert_report(pool: &PgPool, report: &DispatchReport) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for run in &report.runs {
        sqlx::query(
            r#"
            INSERT INTO automation_runs
                (id, org_id, event_id, event_type, recipe, status, dry_run, outcomes, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(report.org_id)
        .bind(report.event_id)
        .bind(&report.event_type)
        .bind(&run.recipe)
        .bind(run.status.to_string())
        .bind(report.dry_run)
        .bind(serde_json::to_value(&run.outcomes)?)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Runs recorded for one event, in insertion order.
pub async fn list_runs_for_event(
    pool: &PgPool,
    org_id: Uuid,
    event_id: Uuid,
) -> Result<Vec<AutomationRunRow>, DbError> {
    let rows = sqlx::query_as::<_, AutomationRunRow>(
        r#"
        SELECT id, org_id, event_id, event_type, recipe, status, dry_run, outcomes, started_at, finished_at
        FROM automation_runs
        WHERE org_id = $1 AND event_id = $2
        ORDER BY started_at ASC
        "#,
    )
    .bind(org_id)
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
