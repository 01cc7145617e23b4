//! Reconstructed round-turn trade.

use crate::domain::{Side, Trend, Volatility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed round-turn derived from the FIFO walk over a run's executions.
///
/// Trades are derived state: they are deleted and re-inserted wholesale on
/// every rebuild, and their ids are not stable across rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub run_id: String,
    pub symbol: String,
    /// The entry side of the round-turn.
    pub side: Side,
    pub entry_utc: DateTime<Utc>,
    pub exit_utc: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub qty: f64,
    pub pnl_gross: f64,
    pub pnl_net: f64,
    pub commission: f64,
    pub duration_secs: f64,
    pub mae: Option<f64>,
    pub mfe: Option<f64>,
    pub regime_trend: Option<Trend>,
    pub regime_volatility: Option<Volatility>,
    pub extras: Option<serde_json::Value>,
}
