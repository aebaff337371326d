//! `automation_rules` repository functions.

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use engine::{Catalog, Recipe};

use crate::{
    DbError,
    models::{AutomationRuleRow, SeedSummary},
};

/// Upsert `recipes` for `org_id`, keyed by recipe name.
///
/// Runs in one transaction so an org never ends up half-seeded.
pub async fn seed_recipes(
    pool: &PgPool,
    org_id: Uuid,
    recipes: &[Recipe],
) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();
    let now = Utc::now();

    for (position, recipe) in recipes.iter().enumerate() {
        let position = i32::try_from(position).unwrap_or(i32::MAX);
        let definition = serde_json::to_value(recipe)?;

        // `xmax = 0` only holds for a freshly inserted tuple.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO automation_rules
                (id, org_id, name, category, trigger_events, definition, is_active, position,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ON CONFLICT (org_id, name) DO UPDATE
            SET category = EXCLUDED.category,
                trigger_events = EXCLUDED.trigger_events,
                definition = EXCLUDED.definition,
                is_active = EXCLUDED.is_active,
                position = EXCLUDED.position,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(&recipe.name)
        .bind(recipe.category.as_str())
        .bind(&recipe.trigger_events)
        .bind(definition)
        .bind(recipe.is_active)
        .bind(position)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if inserted {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }
    }

    tx.commit().await?;
    info!(
        "seeded {} recipe(s) for org {} ({} new, {} updated)",
        recipes.len(),
        org_id,
        summary.inserted,
        summary.updated
    );
    Ok(summary)
}

/// All rules seeded for `org_id`, in catalog order.
pub async fn list_rules(pool: &PgPool, org_id: Uuid) -> Result<Vec<AutomationRuleRow>, DbError> {
    let rows = sqlx::query_as::<_, AutomationRuleRow>(
        r#"
        SELECT id, org_id, name, category, trigger_events, definition, is_active, position,
               created_at, updated_at
        FROM automation_rules
        WHERE org_id = $1
        ORDER BY position, name
        "#,
    )
    .bind(org_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Rebuild the catalog an org has seeded. `None` when nothing is seeded.
pub async fn load_catalog(pool: &PgPool, org_id: Uuid) -> Result<Option<Catalog>, DbError> {
    let rows = list_rules(pool, org_id).await?;
    if rows.is_empty() {
        return Ok(None);
    }
    catalog_from_rows(rows).map(Some)
}

/// Decode rule rows into a catalog ordered by `position`.
pub fn catalog_from_rows(mut rows: Vec<AutomationRuleRow>) -> Result<Catalog, DbError> {
    rows.sort_by_key(|row| row.position);
    let recipes = rows
        .into_iter()
        .map(|row| serde_json::from_value::<Recipe>(row.definition))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Catalog::new(recipes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(recipe: &Recipe, position: i32) -> AutomationRuleRow {
        AutomationRuleRow {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            name: recipe.name.clone(),
            category: recipe.category.as_str().to_owned(),
            trigger_events: recipe.trigger_events.clone(),
            definition: serde_json::to_value(recipe).unwrap(),
            is_active: recipe.is_active,
            position,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn seeded_catalog_keeps_builtin_order() {
        let builtin = Catalog::builtin();
        // Rows as an alphabetical query would return them.
        let mut rows: Vec<AutomationRuleRow> = builtin
            .recipes()
            .iter()
            .enumerate()
            .map(|(i, r)| row(r, i as i32))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let rebuilt = catalog_from_rows(rows).unwrap();
        assert_eq!(rebuilt, builtin);
    }
}
