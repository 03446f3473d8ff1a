//! HTTP surface: thin axum transport over the batch orchestrator.

use crate::command::CommandRunner;
use crate::config::MirrorConfig;
use crate::mirror::{self, MirrorReport};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared application state. The mutex makes the single-flight assumption
/// explicit: the credential file and workspaces are process-wide state, so
/// overlapping trigger calls must not run batches concurrently.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MirrorConfig>,
    pub runner: Arc<dyn CommandRunner>,
    pub batch_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: MirrorConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            batch_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/trigger", get(trigger).post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

async fn home(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": "kernel-mirror",
        "notebooks": state.config.items.len(),
        "endpoints": {
            "trigger": "/trigger",
            "health": "/health",
        },
    }))
}

/// Synchronously runs the whole batch, inter-item delays included, and only
/// then answers. Partial or total batch failure is still a 200; the body
/// carries the per-item outcomes.
async fn trigger(State(state): State<AppState>) -> Json<MirrorReport> {
    let _guard = state.batch_lock.lock().await;
    info!("Trigger received, starting batch");
    let report = mirror::mirror_all(&state.config, state.runner.as_ref()).await;
    Json(report)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "time": Utc::now().to_rfc3339(),
    }))
}
