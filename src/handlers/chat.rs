use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartRequest {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub reply: String,
}

// POST /api/chat/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let user_id = checked_user_id(&payload.user_id)?;
    let mut session = state.engine.session(user_id)?;
    let reply = session.greet();
    tracing::info!(user_id, session_id = %session.stats().session_id, "chat started");
    Ok(Json(StartResponse { reply }))
}

#[derive(Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct TurnResponse {
    pub reply: Option<String>,
    pub session_ended: bool,
    pub stage: Option<&'static str>,
    pub progress: u8,
}

// POST /api/chat
pub async fn turn(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let user_id = checked_user_id(&payload.user_id)?;
    let mut session = state.engine.session(user_id)?;
    let reply = session.respond(&payload.message);

    Ok(Json(TurnResponse {
        session_ended: reply.is_none(),
        reply,
        stage: session.stage().map(|s| s.as_str()),
        progress: session.progress(),
    }))
}

fn checked_user_id(user_id: &str) -> Result<&str, AppError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }
    Ok(trimmed)
}
