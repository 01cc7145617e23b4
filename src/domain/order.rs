//! Order record scoped to a single run.

use crate::domain::{OrderKind, OrderStatus, PositionImpact, Side, TimeInForce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An order as reported by an external execution engine.
///
/// `order_id` is unique within its run; the run id is carried alongside by
/// the store and the wire events, not inside the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub account_id: Option<String>,
    pub side: Side,
    pub kind: OrderKind,
    pub tif: TimeInForce,
    pub qty: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: OrderStatus,
    pub submit_utc: DateTime<Utc>,
    pub update_utc: Option<DateTime<Utc>>,
    pub position_impact: PositionImpact,
    pub parent_order_id: Option<String>,
    /// Opaque producer-specific attributes, never interpreted here.
    pub extras: Option<serde_json::Value>,
}
