use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::Movie;
use crate::state::AppState;

// GET /api/movies
pub async fn list_movies(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, Movie>> {
    Json(state.engine.catalog.get_all().clone())
}
