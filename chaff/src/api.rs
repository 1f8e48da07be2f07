// chaff/src/api.rs
//
// HTTP control surface for the dashboard and automation.
//
// Read endpoints return JSON snapshots; the three write endpoints (engine
// toggle, intensity, viewport hints) mutate single atomic scalars on the
// shared state, so they are safe against concurrent scheduler progress.
// Writes are guarded by an opaque key in the x-chaff-key header when one is
// configured; every write echoes the new value.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::controls::Controls;
use crate::engine::registry::EngineRegistry;
use crate::pattern::timing::Intensity;
use crate::stats::{hourly_chart, RunStats};

const API_KEY_HEADER: &str = "x-chaff-key";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EngineRegistry>,
    pub stats:    Arc<RunStats>,
    pub controls: Arc<Controls>,
    pub config:   Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/stats", get(stats))
        .route("/api/activity", get(activity))
        .route("/api/engines", get(engines))
        .route("/api/chart", get(chart))
        .route("/api/config", get(config))
        .route("/api/engines/:name/toggle", post(toggle_engine))
        .route("/api/intensity", post(set_intensity))
        .route("/api/viewport", post(set_viewport))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("control surface listening on {addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

/// Write-path gate: with no key configured writes are open (LAN dashboard);
/// with one configured the header must match exactly.
fn authorized(config: &Config, headers: &HeaderMap) -> bool {
    match &config.api_key {
        None      => true,
        Some(key) => headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v == key),
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "missing or invalid api key" })),
    )
}

// ── Read endpoints ────────────────────────────────────────────────────────────

async fn status(State(st): State<AppState>) -> Json<Value> {
    let active: Vec<&str> = st
        .registry
        .stats()
        .into_iter()
        .filter(|e| e.enabled)
        .map(|e| e.name)
        .collect();
    Json(json!({
        "status":         "running",
        "uptime_seconds": st.stats.uptime_seconds(),
        "intensity":      st.controls.intensity().as_str(),
        "active_engines": active,
        "persona":        st.controls.persona(),
    }))
}

async fn stats(State(st): State<AppState>) -> Json<Value> {
    Json(json!(st.stats.snapshot(&st.registry)))
}

#[derive(Deserialize)]
struct ActivityParams {
    count: Option<usize>,
}

async fn activity(State(st): State<AppState>, Query(params): Query<ActivityParams>) -> Json<Value> {
    let count = params.count.unwrap_or(50);
    Json(json!({ "activity": st.registry.recent_activity(count) }))
}

async fn engines(State(st): State<AppState>) -> Json<Value> {
    Json(json!({ "engines": st.registry.stats() }))
}

async fn chart(State(st): State<AppState>) -> Json<Value> {
    Json(json!({ "chart": hourly_chart(&st.registry) }))
}

async fn config(State(st): State<AppState>) -> Json<Value> {
    Json(json!(st.config.as_ref()))
}

// ── Write endpoints ───────────────────────────────────────────────────────────

async fn toggle_engine(
    State(st): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&st.config, &headers) {
        return unauthorized();
    }
    match st.registry.toggle(&name) {
        Some(enabled) => {
            info!(engine = %name, enabled, "engine toggled");
            (StatusCode::OK, Json(json!({ "name": name, "enabled": enabled })))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown engine: {name}") })),
        ),
    }
}

#[derive(Deserialize)]
struct IntensityBody {
    intensity: String,
}

async fn set_intensity(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<IntensityBody>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&st.config, &headers) {
        return unauthorized();
    }
    match Intensity::parse(&body.intensity) {
        Some(level) => {
            st.controls.set_intensity(level);
            info!(intensity = %level, "intensity changed");
            (StatusCode::OK, Json(json!({ "intensity": level.as_str() })))
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("invalid intensity: {}", body.intensity) })),
        ),
    }
}

#[derive(Deserialize)]
struct ViewportBody {
    width:  u32,
    height: u32,
}

async fn set_viewport(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ViewportBody>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&st.config, &headers) {
        return unauthorized();
    }
    if body.width == 0 || body.height == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "viewport dimensions must be positive" })),
        );
    }
    st.controls.set_viewport(body.width, body.height);
    (
        StatusCode::OK,
        Json(json!({ "width": body.width, "height": body.height })),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
