// REST control surface for the daemon.
// Read endpoints report state; write endpoints drive the monitor lifecycle,
// manual checks, snipes and queue maintenance.

use crate::market_loop::run_queue_pass;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::info;
use mint_scout_core::scheduler::apply_manual_outcome;
use mint_scout_core::{probe_market, CoreError, MarketStatus, SnipeFill};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub details: Option<String>,
}

/// Capped in-memory event log, newest first, exposed via GET /logs.
pub struct EventLog {
    entries: tokio::sync::Mutex<Vec<LogEntry>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, level: &str, message: String, details: Option<String>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            0,
            LogEntry {
                timestamp: Utc::now(),
                level: level.to_string(),
                message,
                details,
            },
        );
        entries.truncate(MAX_LOG_ENTRIES);
    }

    pub async fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().await.clone()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SnipeRequest {
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub signature: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: String) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn map_core_error(err: CoreError) -> ApiError {
    match err {
        CoreError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
        CoreError::InvalidInput(msg) | CoreError::Validation(msg) => {
            error_response(StatusCode::CONFLICT, msg)
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats", get(get_stats))
        .route("/logs", get(get_logs))
        .route("/tokens/detected", get(get_detected_tokens))
        .route("/tokens/sniped", get(get_sniped_tokens))
        .route("/tokens/clear", post(clear_tokens))
        .route("/tokens/sniped/:mint", delete(remove_sniped_token))
        .route("/tokens/:mint", delete(remove_token))
        .route("/tokens/:mint/check", post(check_token))
        .route("/tokens/:mint/snipe", post(snipe_token))
        .route("/monitor/start", post(start_monitor))
        .route("/monitor/stop", post(stop_monitor))
        .route("/queue/repair", post(repair_queue))
        .route("/queue/process", post(process_queue))
        .route("/backoff/reset", post(reset_backoff))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_health(State(state): State<AppState>) -> Json<Value> {
    let health = state.health.lock().await;
    Json(json!({
        "monitoring": state.monitor.is_running(),
        "connected": health.is_connected(),
        "heartbeat_count": health.heartbeat_count(),
        "last_heartbeat_at": health.last_heartbeat_at(),
        "consecutive_failures": health.consecutive_failures(),
    }))
}

async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    let metrics = state.metrics.snapshot();
    let (queue, backoff_level, last_batch) = {
        let market = state.market.lock().await;
        (
            market.queue_snapshot(),
            market.backoff_level(),
            market.last_batch_started_at(),
        )
    };
    let (detected_count, sniped_count) = {
        let store = state.store.lock().await;
        (store.detected().len(), store.sniped().len())
    };
    Json(json!({
        "metrics": metrics,
        "detected_count": detected_count,
        "sniped_count": sniped_count,
        "queue": queue,
        "queue_len": queue.len(),
        "backoff_level": backoff_level,
        "last_batch_started_at": last_batch,
    }))
}

async fn get_logs(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.event_log.snapshot().await)
}

async fn get_detected_tokens(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    Json(json!({ "tokens": store.detected() }))
}

async fn get_sniped_tokens(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.lock().await;
    Json(json!({ "tokens": store.sniped() }))
}

async fn clear_tokens(State(state): State<AppState>) -> Json<Value> {
    let removed = {
        let mut market = state.market.lock().await;
        let mut store = state.store.lock().await;
        let count = store.detected().len();
        store.clear_detected();
        market.repair(&store, &state.settings.scheduler_config());
        count
    };
    state.persist_or_log().await;
    state
        .event_log
        .push("info", format!("Cleared {} detected tokens", removed), None)
        .await;
    Json(json!({ "removed": removed }))
}

async fn remove_token(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = {
        let mut market = state.market.lock().await;
        let mut store = state.store.lock().await;
        market.remove(&mint);
        store.remove_detected(&mint)
    };
    if !removed {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Token not detected: {}", mint),
        ));
    }
    state.persist_or_log().await;
    Ok(Json(json!({ "removed": mint })))
}

async fn remove_sniped_token(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.store.lock().await.remove_sniped(&mint);
    if !removed {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Token not sniped: {}", mint),
        ));
    }
    state.persist_or_log().await;
    Ok(Json(json!({ "removed": mint })))
}

/// Operator-triggered probe for one mint. Bypasses the queue and the batch
/// guards entirely and leaves the shared backoff level alone.
async fn check_token(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    {
        let mut store = state.store.lock().await;
        if store.get(&mint).is_none() {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Token not detected: {}", mint),
            ));
        }
        store.set_status(&mint, MarketStatus::Checking);
    }

    let verdict = probe_market(&mint, state.quote.as_ref(), &state.settings.probe_config()).await;

    let status = {
        let mut market = state.market.lock().await;
        let mut store = state.store.lock().await;
        apply_manual_outcome(
            &mut market,
            &mut store,
            &mint,
            verdict,
            Utc::now(),
            &state.settings.scheduler_config(),
        )
    };
    state.persist_or_log().await;

    let Some(status) = status else {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Token removed during check: {}", mint),
        ));
    };

    let token = {
        let store = state.store.lock().await;
        store.get(&mint).cloned()
    };
    Ok(Json(json!({ "status": status, "token": token })))
}

async fn snipe_token(
    State(state): State<AppState>,
    Path(mint): Path<String>,
    body: Option<Json<SnipeRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let fill = SnipeFill {
        amount: request.amount,
        price: request.price,
        signature: request.signature,
    };

    let sniped = {
        let mut market = state.market.lock().await;
        let mut store = state.store.lock().await;
        let result = store.snipe(&mint, fill, Utc::now());
        if result.is_ok() {
            market.remove(&mint);
        }
        result.map_err(map_core_error)?
    };
    state.persist_or_log().await;
    state
        .event_log
        .push("info", format!("Sniped token {}", mint), None)
        .await;
    info!("Token {} moved to sniped registry", mint);

    Ok(Json(json!({ "sniped": sniped })))
}

async fn start_monitor(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .monitor
        .start(&state.settings, state.event_tx.clone(), state.health.clone())
        .await
        .map_err(map_core_error)?;
    state
        .event_log
        .push("info", "Monitoring started".to_string(), None)
        .await;
    Ok(Json(json!({ "monitoring": true })))
}

async fn stop_monitor(State(state): State<AppState>) -> Json<Value> {
    state.monitor.stop(state.health.clone()).await;
    state
        .event_log
        .push("info", "Monitoring stopped".to_string(), None)
        .await;
    Json(json!({ "monitoring": false }))
}

async fn repair_queue(State(state): State<AppState>) -> Json<Value> {
    let size = {
        let mut market = state.market.lock().await;
        let store = state.store.lock().await;
        market.repair(&store, &state.settings.scheduler_config())
    };
    state
        .event_log
        .push("info", format!("Queue repaired, {} entries", size), None)
        .await;
    Json(json!({ "queue_len": size }))
}

async fn process_queue(State(state): State<AppState>) -> Json<Value> {
    let processed = run_queue_pass(&state, true).await;
    Json(json!({ "processed": processed }))
}

async fn reset_backoff(State(state): State<AppState>) -> Json<Value> {
    state.market.lock().await.reset_backoff();
    state
        .event_log
        .push("info", "Backoff level reset".to_string(), None)
        .await;
    Json(json!({ "backoff_level": 0 }))
}
