//! FIFO matching: collapse a run's executions into closed round-turns.

use crate::domain::{sort_executions_deterministic, Execution, Order, Side};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Quantities below this are treated as zero when draining lots.
pub const QTY_EPSILON: f64 = 1e-7;

/// A closed round-turn produced by the FIFO walk. Carries no id; ids are
/// minted at persist time and are not stable across rebuilds.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedTrade {
    pub symbol: String,
    /// The entry side.
    pub side: Side,
    pub entry_utc: DateTime<Utc>,
    pub exit_utc: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub qty: f64,
    pub pnl_gross: f64,
    /// Commissions are aggregated from executions by the analyzer, not
    /// apportioned per trade, so net equals gross here.
    pub pnl_net: f64,
    pub commission: f64,
    pub duration_secs: f64,
}

/// An open lot awaiting an opposing fill.
#[derive(Debug, Clone)]
struct OpenLot {
    entry_utc: DateTime<Utc>,
    entry_price: f64,
    remaining_qty: f64,
    side: Side,
}

/// Walk the run's executions in canonical order and emit closed trades.
///
/// Executions referencing unknown orders are skipped with a warning.
/// Matching is strictly per symbol. Residual open lots at the end of the
/// stream are discarded; unrealized positions are never trades.
pub fn reconstruct_trades(executions: &[Execution], orders: &[Order]) -> Vec<ReconstructedTrade> {
    let order_index: HashMap<&str, &Order> =
        orders.iter().map(|o| (o.order_id.as_str(), o)).collect();

    let mut sorted: Vec<Execution> = executions
        .iter()
        .filter(|e| {
            let known = order_index.contains_key(e.order_id.as_str());
            if !known {
                warn!(
                    exec_id = %e.exec_id,
                    order_id = %e.order_id,
                    "execution references unknown order, skipping"
                );
            }
            known
        })
        .cloned()
        .collect();
    sort_executions_deterministic(&mut sorted);

    let mut open_lots: HashMap<String, VecDeque<OpenLot>> = HashMap::new();
    let mut trades = Vec::new();

    for exec in &sorted {
        let order = order_index[exec.order_id.as_str()];
        let side = order.side;
        let symbol = order.symbol.clone();
        let lots = open_lots.entry(symbol.clone()).or_default();
        let mut remaining = exec.qty;

        while remaining > QTY_EPSILON {
            let opposing = lots
                .front()
                .map(|top| top.side == side.opposite())
                .unwrap_or(false);
            if !opposing {
                break;
            }

            let top = lots.front_mut().expect("front checked above");
            let matched = remaining.min(top.remaining_qty);
            let pnl_gross = (exec.price - top.entry_price) * matched * top.side.sign();
            let duration_secs =
                (exec.exec_utc - top.entry_utc).num_milliseconds() as f64 / 1000.0;

            trades.push(ReconstructedTrade {
                symbol: symbol.clone(),
                side: top.side,
                entry_utc: top.entry_utc,
                exit_utc: exec.exec_utc,
                entry_price: top.entry_price,
                exit_price: exec.price,
                qty: matched,
                pnl_gross,
                pnl_net: pnl_gross,
                commission: 0.0,
                duration_secs,
            });

            top.remaining_qty -= matched;
            remaining -= matched;
            if top.remaining_qty <= QTY_EPSILON {
                lots.pop_front();
            }
        }

        if remaining > QTY_EPSILON {
            lots.push_back(OpenLot {
                entry_utc: exec.exec_utc,
                entry_price: exec.price,
                remaining_qty: remaining,
                side,
            });
        }
    }

    trades
}
