pub mod bookings;
pub mod chat;
pub mod health;
pub mod movies;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat/start", post(chat::start))
        .route("/api/chat", post(chat::turn))
        .route("/api/movies", get(movies::list_movies))
        .route("/api/bookings/:reference", get(bookings::get_booking))
        .route(
            "/api/users/:user_id/bookings",
            get(bookings::get_user_bookings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
