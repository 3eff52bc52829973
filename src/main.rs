use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use savoybot::config::AppConfig;
use savoybot::db;
use savoybot::handlers;
use savoybot::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let db = db::open_shared(&config.database_url)?;
    let state = Arc::new(AppState::new(&config, db)?);

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
