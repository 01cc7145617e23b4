//! Execution (fill) record scoped to a single run.

use crate::domain::{Liquidity, PositionImpact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A partial or complete fill of an order.
///
/// References its order by id within the same run; there is no cross-run
/// linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub exec_id: String,
    pub order_id: String,
    pub exec_utc: DateTime<Utc>,
    pub price: f64,
    pub qty: f64,
    pub fee: f64,
    pub fee_currency: Option<String>,
    pub liquidity: Liquidity,
    pub position_impact: PositionImpact,
    pub extras: Option<serde_json::Value>,
}
