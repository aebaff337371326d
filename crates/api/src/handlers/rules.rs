use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use db::models::{AutomationRuleRow, SeedSummary};
use db::repository::rules as rules_repo;

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub org_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub org_id: Uuid,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<Vec<AutomationRuleRow>>, ApiError> {
    Ok(Json(rules_repo::list_rules(&state.pool, query.org_id).await?))
}

/// Copy the built-in catalog into the org's `automation_rules`.
/// Safe to call repeatedly; existing rules are updated in place.
pub async fn seed(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> Result<(StatusCode, Json<SeedSummary>), ApiError> {
    let summary = rules_repo::seed_recipes(&state.pool, req.org_id, state.catalog.recipes()).await?;
    Ok((StatusCode::OK, Json(summary)))
}
