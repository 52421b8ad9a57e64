use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tirebay::config::AppConfig;
use tirebay::db;
use tirebay::handlers;
use tirebay::services::estimator::RuleBook;
use tirebay::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;

    let conn = db::init_db(&config.database_url)?;

    let rules = RuleBook::load(config.rules_path.as_deref())?;
    match &config.rules_path {
        Some(path) => tracing::info!("loaded duration rules from {path}"),
        None => tracing::info!("using embedded duration rules"),
    }

    let state = Arc::new(AppState::new(conn, config.clone(), rules));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
