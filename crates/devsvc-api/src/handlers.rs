use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use devsvc_domain::DeviceCallbackEvent;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

// ── Ping / version ───────────────────────────────────────────────────────────

pub async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.service.version().to_string())
}

pub async fn version(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "version": state.service.version(),
        "sdk_version": state.service.sdk_version(),
    }))
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Serializes via the discovery mutex so only one discovery sweep runs at
/// a time. The sweep itself is driver-defined and out of scope; this
/// endpoint only guarantees the serialization contract.
pub async fn post_discovery(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let _guard = state.service.discovery_mutex().lock().await;
    debug!("discovery sweep requested");
    Ok(Json(json!({ "status": "accepted" })))
}

// ── Device command interface ─────────────────────────────────────────────────

fn resolve_command(state: &AppState, device_name: &str, command: &str) -> Result<(), ApiError> {
    let device = state
        .service
        .device_map()
        .find_by_name(device_name)
        .ok_or_else(|| ApiError::not_found(format!("device '{device_name}' not found")))?;
    let profile = device
        .profile
        .as_ref()
        .ok_or_else(|| ApiError::internal(format!("device '{device_name}' has no resolved profile")))?;
    profile
        .find_command(command)
        .ok_or_else(|| ApiError::not_found(format!("command '{command}' not found on device '{device_name}'")))?;
    Ok(())
}

/// GET resolves the device/command pair and hands off to the driver-defined
/// read path. The read itself is out of scope here; this confirms the
/// command exists and is readable.
pub async fn get_device_command(
    State(state): State<AppState>,
    Path((device_name, command)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    resolve_command(&state, &device_name, &command)?;
    Ok(Json(json!({ "device": device_name, "command": command, "status": "accepted" })))
}

/// PUT/POST resolve the device/command pair and acknowledge; the actual
/// write dispatch is driver-defined and out of scope here.
pub async fn set_device_command(
    State(state): State<AppState>,
    Path((device_name, command)): Path<(String, String)>,
    Json(_body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    resolve_command(&state, &device_name, &command)?;
    Ok(Json(json!({ "device": device_name, "command": command, "status": "accepted" })))
}

// ── Callback ──────────────────────────────────────────────────────────────────

pub async fn callback(
    State(state): State<AppState>,
    Json(event): Json<DeviceCallbackEvent>,
) -> Result<StatusCode, ApiError> {
    state.service.handle_callback(event).await?;
    Ok(StatusCode::OK)
}

// ── Config / metrics ──────────────────────────────────────────────────────────

pub async fn config(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.service.config_snapshot().await))
}

pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.service.metrics_snapshot();
    Json(json!({
        "readings_posted": snapshot.readings_posted,
        "readings_dropped": snapshot.readings_dropped,
        "uptime_secs": state.service.uptime_secs().await,
        "device_count": state.service.device_map().len(),
        "worker_queue_depth": state.service.worker_queue_depth().await,
        "worker_active_count": state.service.worker_active_count().await,
    }))
}
