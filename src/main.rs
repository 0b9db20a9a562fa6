use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod predict;
mod stats;

use api::AppState;
use config::Config;
use stats::NbaStats;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let pipeline = config.pipeline();
    info!(
        "Season {}: window of {} games, holdout {}, rolling windows {:?}",
        pipeline.season, pipeline.window_cap, pipeline.holdout_size, pipeline.rolling_windows
    );

    let nba = Arc::new(NbaStats::new(
        &config.nba_stats_url,
        &config.season,
        Duration::from_secs(config.http_timeout_secs),
        Duration::from_millis(config.request_spacing_ms),
    )?);
    info!(
        "Stats provider: {} (min spacing {} ms)",
        config.nba_stats_url, config.request_spacing_ms
    );

    let state = AppState {
        provider: nba.clone(),
        season_stats: nba,
        pipeline,
    };
    let app = api::router(state, api::cors_layer(&config.cors_origins)?);

    let addr: SocketAddr = config.api_addr.parse()?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
