//! REST handlers mounted under `/api/v1`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::orchestrator::{StatusReport, TaskResponse};
use crate::scheduler::{JobAction, JobInfo, SchedulerStatus, Trigger};
use crate::types::{ConversationContext, ResponseEnvelope};
use crate::version::build_info;

use super::error::ApiError;
use super::state::AppState;

pub const DEFAULT_ASSISTANT: &str = "ruby";

fn default_assistant() -> String {
    DEFAULT_ASSISTANT.to_string()
}

// ─────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_assistant")]
    pub assistant: String,
    #[serde(default)]
    pub context: Option<ConversationContext>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<ResponseEnvelope> {
    let reply = state
        .orchestrator
        .route(&req.assistant, &req.message, req.context)
        .await;
    Json(reply)
}

// ─────────────────────────────────────────────────────────────────
// Assistants
// ─────────────────────────────────────────────────────────────────

pub async fn list_assistants(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let StatusReport::Overview { assistants, .. } = state.orchestrator.status(None)? else {
        return Err(Error::Internal("unexpected status report".to_string()).into());
    };
    Ok(Json(json!({
        "count": assistants.len(),
        "assistants": assistants,
    })))
}

pub async fn assistant_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatusReport>, ApiError> {
    Ok(Json(state.orchestrator.status(Some(&name))?))
}

// ─────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub task_type: String,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default = "default_assistant")]
    pub assistant: String,
}

pub async fn execute_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<TaskResponse> {
    let params = req.parameters.unwrap_or_else(|| json!({}));
    Json(
        state
            .orchestrator
            .execute_task(&req.assistant, &req.task_type, params)
            .await,
    )
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.orchestrator.scheduler().status())
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub when: String,
    pub description: String,
}

/// Schedule a reminder that logs its description when it fires.
pub async fn schedule_task(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<JobInfo>), ApiError> {
    state.orchestrator.initialize().await?;

    let trigger = Trigger::parse(&req.when, Utc::now())?;
    let id = req
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("reminder-{}", &Uuid::new_v4().simple().to_string()[..8]));

    let job = state
        .orchestrator
        .scheduler()
        .schedule(&id, trigger, &req.description, reminder(&id, &req.description))
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub fn reminder(id: &str, description: &str) -> JobAction {
    let id: Arc<str> = Arc::from(id);
    let description: Arc<str> = Arc::from(description);
    Arc::new(move || {
        let id = id.clone();
        let description = description.clone();
        Box::pin(async move {
            info!(job = %id, description = %description, "Reminder");
        })
    })
}

pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.orchestrator.scheduler().cancel(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::JobNotFound { id }.into())
    }
}

// ─────────────────────────────────────────────────────────────────
// System
// ─────────────────────────────────────────────────────────────────

pub async fn system_health(State(state): State<AppState>) -> Json<Value> {
    let orchestrator = &state.orchestrator;
    Json(json!({
        "status": "healthy",
        "service": state.app_name,
        "timestamp": Utc::now().to_rfc3339(),
        "initialized": orchestrator.is_initialized(),
        "scheduler_running": orchestrator.scheduler().is_running(),
        "models": orchestrator.coordinator().available_models(),
        "backends": orchestrator.coordinator().backend_health().await,
    }))
}

pub async fn system_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let orchestrator = &state.orchestrator;
    let StatusReport::Overview {
        orchestrator: summary,
        assistants,
    } = orchestrator.status(None)?
    else {
        return Err(Error::Internal("unexpected status report".to_string()).into());
    };

    Ok(Json(json!({
        "app_name": state.app_name,
        "version": build_info().full_version(),
        "build": build_info(),
        "orchestrator": summary,
        "assistants_count": assistants.len(),
        "host": orchestrator.monitor().snapshot(),
        "websocket_connections": state.connections.active(),
        "websocket_connections_total": state.connections.total(),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "app": state.app_name,
        "version": build_info().version,
        "assistants": state.orchestrator.assistant_names(),
    }))
}
