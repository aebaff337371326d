use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use db::models::AutomationRunRow;
use db::repository::{rules as rules_repo, runs as runs_repo};
use engine::{Catalog, DispatchReport, Event};

use crate::handlers::rules::OrgQuery;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub org_id: Uuid,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Supplied by producers that redeliver; generated otherwise.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dry_run: bool,
}

impl DispatchRequest {
    fn into_event(self) -> Result<Event, ApiError> {
        if !engine::catalog::is_valid_event_name(&self.event_type) {
            return Err(ApiError::BadRequest(format!(
                "'{}' is not a valid event type",
                self.event_type
            )));
        }
        if !self.payload.is_object() {
            return Err(ApiError::BadRequest("payload must be a JSON object".into()));
        }

        let mut event = Event::new(self.event_type, self.payload);
        if let Some(id) = self.id {
            event.id = id;
        }
        if let Some(at) = self.occurred_at {
            event.occurred_at = at;
        }
        Ok(event)
    }
}

/// Run every matching recipe for the event and record the runs.
pub async fn dispatch(
    State(state): State<AppState>,
    Json(req): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<DispatchReport>), ApiError> {
    let (org_id, actor_id, dry_run) = (req.org_id, req.actor_id, req.dry_run);
    let event = req.into_event()?;
    let ctx = event.context(org_id, actor_id, dry_run);

    let catalog: Arc<Catalog> = match rules_repo::load_catalog(&state.pool, org_id).await? {
        Some(seeded) => Arc::new(seeded),
        None => state.catalog.clone(),
    };

    let report = state.executor.dispatch(&catalog, &event, &ctx).await;
    runs_repo::insert_report(&state.pool, &report).await?;

    info!(
        "event {} ({}) matched {} recipe(s), {} failed action(s)",
        report.event_id,
        report.event_type,
        report.runs.len(),
        report.failure_count()
    );
    Ok((StatusCode::ACCEPTED, Json(report)))
}

/// Recorded recipe runs for one event of an org.
pub async fn runs(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> Result<Json<Vec<AutomationRunRow>>, ApiError> {
    Ok(Json(runs_repo::list_runs_for_event(&state.pool, query.org_id, event_id).await?))
}
