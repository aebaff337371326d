use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use engine::{Category, Recipe};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RecipeQuery {
    pub category: Option<String>,
}

/// The built-in catalog, optionally narrowed to one category.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<Json<Vec<Recipe>>, ApiError> {
    let recipes = match query.category.as_deref() {
        None => state.catalog.recipes().to_vec(),
        Some(raw) => {
            let category: Category = raw.parse().map_err(ApiError::BadRequest)?;
            state
                .catalog
                .recipes_by_category(category)
                .into_iter()
                .cloned()
                .collect()
        }
    };
    Ok(Json(recipes))
}

pub async fn trigger_events(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(
        state
            .catalog
            .all_trigger_events()
            .into_iter()
            .map(str::to_owned)
            .collect(),
    )
}
