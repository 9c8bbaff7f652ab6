// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use time_seeker::application::batch_cache::BatchDataCache;
use time_seeker::application::clock::{Clock, SystemClock};
use time_seeker::application::host::HostTimeRange;
use time_seeker::application::seeker_engine::SeekerEngine;
use time_seeker::application::seeker_service::SeekerService;
use time_seeker::domain::time_range::{HOUR_MS, TimeRange};
use time_seeker::infrastructure::config::load_seeker_config;
use time_seeker::infrastructure::dashboard_time_range::DashboardTimeRange;
use time_seeker::infrastructure::influx_repository::InfluxRepository;
use time_seeker::presentation::app_state::AppState;
use time_seeker::presentation::handlers::{
    get_chart, get_dashboard_range, get_seeker, health_check, pan, put_dashboard_range, reset,
    retry, set_context, set_query, set_timeline, wheel, zoom,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_seeker_config().context("Failed to load config/seeker")?;
    let engine_settings = config.seeker.engine_settings()?;
    let query = config.seeker.initial_query()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(InfluxRepository::new(
        config.influx.clone(),
        config.queries.clone(),
        config.seeker.max_points_per_batch,
    ));

    // Host range starts at the last hour
    let clock = Arc::new(SystemClock);
    let now = clock.now_ms();
    let host = Arc::new(DashboardTimeRange::new(TimeRange::new(now - HOUR_MS, now)?));

    // Create services (application layer)
    let cache = BatchDataCache::with_capacity(clock, config.seeker.max_cached_batches);
    let engine = SeekerEngine::new(cache, query, host.current(), engine_settings);
    let seeker = SeekerService::spawn(engine, repository, host.clone());

    let state = Arc::new(AppState { seeker, host });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/seeker", get(get_seeker))
        .route("/seeker/chart", get(get_chart))
        .route("/seeker/zoom", post(zoom))
        .route("/seeker/pan", post(pan))
        .route("/seeker/reset", post(reset))
        .route("/seeker/context", post(set_context))
        .route("/seeker/timeline", post(set_timeline))
        .route("/seeker/wheel", post(wheel))
        .route("/seeker/retry", post(retry))
        .route("/seeker/query", post(set_query))
        .route("/dashboard/range", get(get_dashboard_range).put(put_dashboard_range))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting time-seeker service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
