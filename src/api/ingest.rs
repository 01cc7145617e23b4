use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::domain::{Strategy, StrategyInstance, StrategyRun};
use crate::error::AppError;
use crate::ingest::{
    BarBatchEvent, BarEvent, ExecutionBatchEvent, ExecutionEvent, InstanceEvent, OrderBatchEvent,
    OrderEvent, RunEndEvent, RunStartEvent, StrategyEvent, StreamBatchEvent,
};

pub async fn post_strategy(
    State(state): State<AppState>,
    Json(event): Json<StrategyEvent>,
) -> Result<Json<Strategy>, AppError> {
    let strategy = state.ingestor.apply_strategy(event).await?;
    Ok(Json(strategy))
}

pub async fn post_instance(
    State(state): State<AppState>,
    Json(event): Json<InstanceEvent>,
) -> Result<Json<StrategyInstance>, AppError> {
    let instance = state.ingestor.apply_instance(event).await?;
    Ok(Json(instance))
}

pub async fn post_run(
    State(state): State<AppState>,
    Json(event): Json<RunStartEvent>,
) -> Result<Json<StrategyRun>, AppError> {
    let run = state.ingestor.apply_run_start(event).await?;
    Ok(Json(run))
}

pub async fn post_run_end(
    State(state): State<AppState>,
    Json(event): Json<RunEndEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let run_id = event.run_id.clone();
    state.ingestor.apply_run_end(event).await?;
    Ok(Json(serde_json::json!({"run_id": run_id, "ended": true})))
}

pub async fn post_order(
    State(state): State<AppState>,
    Json(event): Json<OrderEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.ingestor.apply_order(event).await?;
    Ok(Json(serde_json::json!({"ingested": 1})))
}

pub async fn post_orders(
    State(state): State<AppState>,
    Json(event): Json<OrderBatchEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ingested = state.ingestor.apply_orders(event).await?;
    Ok(Json(serde_json::json!({"ingested": ingested})))
}

pub async fn post_execution(
    State(state): State<AppState>,
    Json(event): Json<ExecutionEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.ingestor.apply_execution(event).await?;
    Ok(Json(serde_json::json!({"ingested": 1})))
}

pub async fn post_executions(
    State(state): State<AppState>,
    Json(event): Json<ExecutionBatchEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ingested = state.ingestor.apply_executions(event).await?;
    Ok(Json(serde_json::json!({"ingested": ingested})))
}

pub async fn post_bar(
    State(state): State<AppState>,
    Json(event): Json<BarEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ingested = state.ingestor.apply_bars(event.into_batch()).await?;
    Ok(Json(serde_json::json!({"ingested": ingested})))
}

pub async fn post_bars(
    State(state): State<AppState>,
    Json(event): Json<BarBatchEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ingested = state.ingestor.apply_bars(event).await?;
    Ok(Json(serde_json::json!({"ingested": ingested})))
}

pub async fn post_stream(
    State(state): State<AppState>,
    Json(event): Json<StreamBatchEvent>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orders = event.orders.len();
    let executions = event.executions.len();
    let bars: usize = event.bars.iter().map(|b| b.bars.len()).sum();
    state.ingestor.apply_stream(event).await?;
    Ok(Json(serde_json::json!({
        "orders": orders,
        "executions": executions,
        "bars": bars,
    })))
}
