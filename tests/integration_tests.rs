use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use savoybot::config::AppConfig;
use savoybot::db;
use savoybot::handlers;
use savoybot::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        database_url: ":memory:".to_string(),
        ..AppConfig::default()
    }
}

fn test_state() -> Arc<AppState> {
    let config = test_config();
    let db = db::open_shared(&config.database_url).unwrap();
    Arc::new(AppState::new(&config, db).unwrap())
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn read_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    (status, read_json(res).await)
}

async fn post_json(
    state: &Arc<AppState>,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    (status, read_json(res).await)
}

async fn chat(state: &Arc<AppState>, user_id: &str, message: &str) -> serde_json::Value {
    let (status, json) = post_json(
        state,
        "/api/chat",
        serde_json::json!({ "user_id": user_id, "message": message }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

// ── Basic Endpoints ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let res = test_app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_list_movies() {
    let state = test_state();
    let (status, json) = get(&state, "/api/movies").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dune2"]["title"], "Dune: Part Two");
    assert_eq!(json["paddington3"]["times"][0], "11:00");
    assert_eq!(json.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_booking_reference() {
    let state = test_state();
    let (status, json) = get(&state, "/api/bookings/BK00000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("BK00000"));
}

// ── Chat ──

#[tokio::test]
async fn test_chat_start_asks_for_name() {
    let state = test_state();
    let (status, json) = post_json(
        &state,
        "/api/chat/start",
        serde_json::json!({ "user_id": "web-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!json["reply"].as_str().unwrap().is_empty());

    let json = chat(&state, "web-1", "Alex").await;
    assert!(json["reply"].as_str().unwrap().contains("Alex"));
    assert_eq!(json["session_ended"], false);
}

#[tokio::test]
async fn test_chat_requires_user_id() {
    let state = test_state();
    let (status, json) = post_json(
        &state,
        "/api/chat",
        serde_json::json!({ "user_id": "  ", "message": "hello" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("user_id"));
}

#[tokio::test]
async fn test_chat_booking_end_to_end() {
    let state = test_state();

    let json = chat(&state, "web-2", "book dune").await;
    assert_eq!(json["stage"], "time");
    assert_eq!(json["progress"], 25);

    let json = chat(&state, "web-2", "13:00").await;
    assert_eq!(json["stage"], "tickets");

    let json = chat(&state, "web-2", "2").await;
    assert_eq!(json["stage"], "seats");
    assert!(json["reply"].as_str().unwrap().contains("SCREEN"));

    let json = chat(&state, "web-2", "A1, A2").await;
    assert_eq!(json["stage"], "confirm");
    assert_eq!(json["progress"], 100);

    let json = chat(&state, "web-2", "yes").await;
    assert!(json["stage"].is_null());
    assert_eq!(json["progress"], 0);

    let (status, list) = get(&state, "/api/users/web-2/bookings").await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    let reference = list[0]["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("BK"));
    assert_eq!(reference.len(), 7);

    let (status, booking) = get(&state, &format!("/api/bookings/{reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["seats"], serde_json::json!(["A1", "A2"]));
    assert_eq!(booking["total"], "25.00");
    assert_eq!(booking["showtime"], "13:00");
    assert_eq!(booking["user_name"], "Guest");

    // The same seats are now refused for the same showing.
    chat(&state, "web-3", "book dune").await;
    chat(&state, "web-3", "13:00").await;
    chat(&state, "web-3", "2").await;
    let json = chat(&state, "web-3", "A1 A2").await;
    assert_eq!(json["stage"], "seats");
    assert!(json["reply"].as_str().unwrap().contains("A1 (taken)"));
}

#[tokio::test]
async fn test_chat_cancel_and_quit() {
    let state = test_state();

    chat(&state, "web-4", "book joker").await;
    let json = chat(&state, "web-4", "cancel").await;
    assert!(json["stage"].is_null());

    let json = chat(&state, "web-4", "quit").await;
    assert!(json["reply"].is_null());
    assert_eq!(json["session_ended"], true);

    let (_, list) = get(&state, "/api/users/web-4/bookings").await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_chat_restart_mid_booking_keeps_confirmation() {
    let state = test_state();

    chat(&state, "web-5", "book paddington").await;
    chat(&state, "web-5", "11:00").await;
    chat(&state, "web-5", "1").await;
    let json = chat(&state, "web-5", "C3").await;
    assert_eq!(json["stage"], "confirm");

    let (status, json) = post_json(
        &state,
        "/api/chat/start",
        serde_json::json!({ "user_id": "web-5" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["reply"].as_str().unwrap().contains("booking in progress"));

    let json = chat(&state, "web-5", "ok").await;
    assert!(json["stage"].is_null());

    let (_, list) = get(&state, "/api/users/web-5/bookings").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["seats"], serde_json::json!(["C3"]));
    assert_eq!(list[0]["total"], "10.00");
}
