// HTTP request handlers
use crate::application::host::HostTimeRange;
use crate::application::seeker_engine::SeekerSnapshot;
use crate::application::seeker_service::SeekerCommand;
use crate::domain::chart::ChartConfig;
use crate::domain::error::SeekerError;
use crate::domain::series::{MetricKind, SeekerQuery};
use crate::domain::time_range::{ContextPreset, PanDirection, TimeRange};
use crate::presentation::app_state::AppState;
use crate::presentation::http_response::ApiError;
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// How long a command may take before the handler answers with the last snapshot.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
pub struct ZoomRequest {
    pub factor: f64,
}

#[derive(Deserialize)]
pub struct PanRequest {
    pub direction: PanDirection,
}

/// Either a preset label (`"24h"`, `"0h"`, ...) or an absolute `from`/`to`.
#[derive(Deserialize)]
pub struct ContextRequest {
    pub preset: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Deserialize)]
pub struct RangeRequest {
    pub from: i64,
    pub to: i64,
}

#[derive(Deserialize)]
pub struct WheelRequest {
    pub cursor_ms: i64,
    pub delta_y: f64,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub metric: String,
    #[serde(default)]
    pub selection: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_seeker(State(state): State<Arc<AppState>>) -> Json<SeekerSnapshot> {
    Json(state.seeker.snapshot())
}

/// Chart options for the current metric and context window
pub async fn get_chart(State(state): State<Arc<AppState>>) -> Json<ChartConfig> {
    let snapshot = state.seeker.snapshot();
    Json(ChartConfig::for_metric(snapshot.query.metric, snapshot.visible))
}

pub async fn zoom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ZoomRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    if !(request.factor.is_finite() && request.factor > 0.0) {
        return Err(SeekerError::InvalidFactor(request.factor).into());
    }
    dispatch(&state, SeekerCommand::Zoom(request.factor)).await
}

pub async fn pan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PanRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    dispatch(&state, SeekerCommand::Pan(request.direction)).await
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<SeekerSnapshot>, ApiError> {
    dispatch(&state, SeekerCommand::Reset).await
}

pub async fn set_context(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContextRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    dispatch(&state, context_command(request)?).await
}

pub async fn set_timeline(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RangeRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    let range = TimeRange::new(request.from, request.to)?;
    dispatch(&state, SeekerCommand::SetTimeline(range)).await
}

pub async fn wheel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WheelRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    dispatch(
        &state,
        SeekerCommand::WheelZoom {
            cursor_ms: request.cursor_ms,
            delta_y: request.delta_y,
        },
    )
    .await
}

pub async fn retry(State(state): State<Arc<AppState>>) -> Result<Json<SeekerSnapshot>, ApiError> {
    dispatch(&state, SeekerCommand::RetryErrors).await
}

pub async fn set_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SeekerSnapshot>, ApiError> {
    let metric: MetricKind = request.metric.parse()?;
    dispatch(&state, SeekerCommand::SetQuery(SeekerQuery::new(metric, request.selection))).await
}

pub async fn get_dashboard_range(State(state): State<Arc<AppState>>) -> Json<TimeRange> {
    Json(state.host.current())
}

/// Simulates the dashboard picker; the seeker follows through its host subscription.
pub async fn put_dashboard_range(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RangeRequest>,
) -> Result<Json<TimeRange>, ApiError> {
    let range = TimeRange::new(request.from, request.to)?;
    state.host.set_time_range(range);
    Ok(Json(range))
}

fn context_command(request: ContextRequest) -> Result<SeekerCommand, SeekerError> {
    match (request.preset, request.from, request.to) {
        (Some(label), _, _) => Ok(SeekerCommand::ApplyPreset(ContextPreset::parse(&label)?)),
        (None, Some(from), Some(to)) => Ok(SeekerCommand::ApplyAbsoluteContext(TimeRange::new_context(from, to)?)),
        _ => Err(SeekerError::InvalidDuration("expected a preset or both from and to".to_string())),
    }
}

/// Send a command and answer with the first snapshot published after it.
async fn dispatch(state: &AppState, command: SeekerCommand) -> Result<Json<SeekerSnapshot>, ApiError> {
    let mut snapshots = state.seeker.subscribe();
    snapshots.borrow_and_update();
    state.seeker.send(command).await?;

    match tokio::time::timeout(COMMAND_TIMEOUT, snapshots.changed()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => return Err(anyhow::anyhow!("seeker service has stopped").into()),
        Err(_) => tracing::warn!("No snapshot within {:?}, answering with the last one", COMMAND_TIMEOUT),
    }
    let snapshot = snapshots.borrow().clone();
    Ok(Json(snapshot))
}
