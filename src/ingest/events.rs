//! Wire events accepted by the ingestion surface.
//!
//! Events carry caller-assigned identifiers so replays are idempotent.
//! Validation here covers structural problems only; referential checks
//! (unknown strategy, unknown run) live in the ingestor.

use crate::domain::{Bar, Execution, Order, RunKind, RunStatus};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEvent {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub source_ref: Option<String>,
    pub kind: Option<String>,
    pub params_schema: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEvent {
    pub id: String,
    pub strategy_id: String,
    pub name: Option<String>,
    pub params: Option<serde_json::Value>,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub account_id: Option<String>,
    pub venue: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartEvent {
    pub id: String,
    pub instance_id: String,
    pub kind: RunKind,
    pub start_utc: DateTime<Utc>,
    pub engine_version: Option<String>,
    pub data_source: Option<String>,
    pub initial_balance: Option<f64>,
    pub base_currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEndEvent {
    pub run_id: String,
    pub end_utc: DateTime<Utc>,
    /// Terminal status; defaults to COMPLETED when omitted.
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub run_id: String,
    #[serde(flatten)]
    pub order: Order,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBatchEvent {
    pub run_id: String,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub run_id: String,
    #[serde(flatten)]
    pub execution: Execution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionBatchEvent {
    pub run_id: String,
    pub executions: Vec<Execution>,
}

/// A single bar, identified by its series tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarEvent {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub provider: String,
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub bar: Bar,
}

impl BarEvent {
    pub fn into_batch(self) -> BarBatchEvent {
        BarBatchEvent {
            symbol: self.symbol,
            timeframe: self.timeframe,
            venue: self.venue,
            provider: self.provider,
            run_id: self.run_id,
            bars: vec![self.bar],
        }
    }
}

/// Bars for one series, optionally linked to a run so reconstruction can
/// resolve the run's primary market data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarBatchEvent {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub provider: String,
    pub run_id: Option<String>,
    pub bars: Vec<Bar>,
}

/// A mixed batch applied atomically, used by live producers that flush
/// orders and fills together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamBatchEvent {
    pub run_id: String,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub bars: Vec<BarBatchEvent>,
}

pub fn validate_strategy(event: &StrategyEvent) -> Result<(), AppError> {
    require_id("strategy id", &event.id)?;
    if event.name.trim().is_empty() {
        return Err(AppError::BadRequest("strategy name must not be empty".into()));
    }
    Ok(())
}

pub fn validate_instance(event: &InstanceEvent) -> Result<(), AppError> {
    require_id("instance id", &event.id)?;
    require_id("strategy id", &event.strategy_id)?;
    Ok(())
}

pub fn validate_run_start(event: &RunStartEvent) -> Result<(), AppError> {
    require_id("run id", &event.id)?;
    require_id("instance id", &event.instance_id)?;
    if let Some(balance) = event.initial_balance {
        require_finite("initial_balance", balance)?;
    }
    Ok(())
}

pub fn validate_order(order: &Order) -> Result<(), AppError> {
    require_id("order id", &order.order_id)?;
    require_id("symbol", &order.symbol)?;
    if !(order.qty > 0.0) {
        return Err(AppError::BadRequest(format!(
            "order {} qty must be positive",
            order.order_id
        )));
    }
    if let Some(price) = order.price {
        require_finite("price", price)?;
    }
    if let Some(stop) = order.stop_price {
        require_finite("stop_price", stop)?;
    }
    Ok(())
}

pub fn validate_execution(exec: &Execution) -> Result<(), AppError> {
    require_id("exec id", &exec.exec_id)?;
    require_id("order id", &exec.order_id)?;
    if !(exec.qty > 0.0) {
        return Err(AppError::BadRequest(format!(
            "execution {} qty must be positive",
            exec.exec_id
        )));
    }
    require_finite("price", exec.price)?;
    require_finite("fee", exec.fee)?;
    Ok(())
}

pub fn validate_bar_batch(event: &BarBatchEvent) -> Result<(), AppError> {
    require_id("symbol", &event.symbol)?;
    require_id("timeframe", &event.timeframe)?;
    for bar in &event.bars {
        require_finite("open", bar.open)?;
        require_finite("high", bar.high)?;
        require_finite("low", bar.low)?;
        require_finite("close", bar.close)?;
        if bar.high < bar.low {
            return Err(AppError::BadRequest(format!(
                "bar at {} has high below low",
                bar.ts_utc
            )));
        }
    }
    Ok(())
}

fn require_id(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::BadRequest(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn require_finite(field: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("{} must be finite", field)))
    }
}

/// Normalize a JSON document to deterministic object key order, so that
/// repeated ingestion of the same schema compares and hashes identically.
pub fn normalize_json(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_json(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(normalize_json).collect())
        }
        other => other,
    }
}
