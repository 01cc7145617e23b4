use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::analytics::{aggregate_regime_performance, RegimePerformance};
use crate::domain::{Bar, Execution, StrategyRun, Trade};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

pub async fn get_run(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StrategyRun>, AppError> {
    let run = state
        .repo
        .get_run(&run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("run {}", run_id)))?;
    Ok(Json(run))
}

pub async fn get_trades(
    Path(run_id): Path<String>,
    Query(window): Query<WindowQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Trade>>, AppError> {
    require_run(&state, &run_id).await?;
    let trades = state
        .repo
        .fetch_trades(&run_id, window.from_ms, window.to_ms)
        .await?;
    Ok(Json(trades))
}

pub async fn get_executions(
    Path(run_id): Path<String>,
    Query(window): Query<WindowQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Execution>>, AppError> {
    require_run(&state, &run_id).await?;
    let executions = state
        .repo
        .fetch_executions_window(&run_id, window.from_ms, window.to_ms)
        .await?;
    Ok(Json(executions))
}

pub async fn get_bars(
    Path(run_id): Path<String>,
    Query(window): Query<WindowQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Bar>>, AppError> {
    require_run(&state, &run_id).await?;
    let bars = state
        .repo
        .fetch_run_bars(&run_id, window.from_ms, window.to_ms)
        .await?;
    Ok(Json(bars))
}

/// Latest metrics snapshot; recomputed and persisted lazily when absent.
pub async fn get_metrics(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let run = state
        .repo
        .get_run(&run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("run {}", run_id)))?;

    if let Some(metrics) = run.metrics_json {
        return Ok(Json(metrics));
    }

    let kind = state.analytics.strategy_kind_for_run(&run_id).await?;
    let metrics = state.analytics.route_analysis(&run_id, kind).await?;
    let metrics_json = serde_json::to_value(&metrics)
        .map_err(|e| AppError::Internal(format!("failed to serialize metrics: {}", e)))?;
    state.repo.update_run_metrics(&run_id, &metrics_json).await?;
    Ok(Json(metrics_json))
}

pub async fn get_regime_performance(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RegimePerformance>, AppError> {
    require_run(&state, &run_id).await?;
    let trades = state.repo.fetch_trades(&run_id, None, None).await?;
    Ok(Json(aggregate_regime_performance(&trades)))
}

pub async fn post_rebuild(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_run(&state, &run_id).await?;
    let enqueued = state.jobs.enqueue(&run_id);
    Ok(Json(serde_json::json!({"enqueued": enqueued})))
}

pub async fn post_cancel(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_run(&state, &run_id).await?;
    let canceled = state.jobs.cancel(&run_id);
    Ok(Json(serde_json::json!({"canceled": canceled})))
}

async fn require_run(state: &AppState, run_id: &str) -> Result<(), AppError> {
    if state.repo.get_run(run_id).await?.is_none() {
        return Err(AppError::NotFound(format!("run {}", run_id)));
    }
    Ok(())
}
