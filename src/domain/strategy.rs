//! Strategy identity, bound instances, and runs.

use crate::domain::{RunKind, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an algorithm. Created on first sighting during ingestion
/// and effectively immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub source_ref: Option<String>,
    /// Analyzer dispatch tag; unknown tags fall back to the standard analyzer.
    pub kind: Option<String>,
    /// Ordered parameter descriptors, normalized to deterministic key order.
    pub params_schema: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// A bound configuration of a Strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInstance {
    pub id: String,
    pub strategy_id: String,
    pub name: Option<String>,
    pub params: Option<serde_json::Value>,
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub account_id: Option<String>,
    pub venue: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// A single execution of an Instance. Owns its orders, executions, and
/// reconstructed trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRun {
    pub id: String,
    pub instance_id: String,
    pub kind: RunKind,
    pub status: RunStatus,
    pub start_utc: DateTime<Utc>,
    pub end_utc: Option<DateTime<Utc>>,
    pub engine_version: Option<String>,
    pub data_source: Option<String>,
    pub initial_balance: Option<f64>,
    pub base_currency: Option<String>,
    /// Snapshot of the latest reconstruction's portfolio metrics.
    pub metrics_json: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}
