mod api;

use std::time::Duration;

use axum::{http::Method, routing::get, Router};
use sqlx::SqlitePool;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{Any, CorsLayer};

use crate::{config::Config, subcommands};

#[derive(Clone)]
pub struct AppState {
    config: Config,
    pool: SqlitePool,
}

pub async fn start(config: &Config, conn: &SqlitePool) -> anyhow::Result<()> {
    if config.indexer() {
        let _indexer = tokio::spawn(indexer(config.clone()));
    }

    let state = AppState {
        config: config.clone(),
        pool: conn.clone(),
    };
    let app = router(config.api()).with_state(state);

    let addr = config
        .server_bind()
        .unwrap_or_else(|| "0.0.0.0:42069".into())
        .parse()?;

    tracing::info!("Starting server on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(elegant_departure::tokio::depart().on_termination())
        .await?;

    tracing::info!("Server shutdown complete.");
    elegant_departure::shutdown().await;
    Ok(())
}

fn router(api: bool) -> Router<AppState> {
    let mut app = Router::new();

    if api {
        app = app
            .route("/api/history", get(api::history))
            .route("/api/chart", get(api::chart))
            .route("/api/balance", get(api::balance))
            .route("/api/balance_at", get(api::balance_at))
            .route("/api/safe", get(api::safe))
            .route("/api/stats", get(api::stats));
    }

    app.layer(
        CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_origin(Any),
    )
}

async fn indexer(config: Config) -> anyhow::Result<()> {
    let mut interval = interval(Duration::from_secs(config.server_indexer_delay()));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        match subcommands::index(&config).await {
            Ok(_) => {}
            Err(err) => tracing::error!("Indexing error: {}", err),
        }
        interval.tick().await;
    }
}
