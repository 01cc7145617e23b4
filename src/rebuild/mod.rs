//! Trade reconstruction service: rebuilds a run's canonical trade set.

use crate::analytics::AnalyticsRouter;
use crate::db::Repository;
use crate::domain::{Trade, Trend, Volatility};
use crate::engine::{label_bars, reconstruct_trades, RegimePoint};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct TradeRebuilder {
    repo: Arc<Repository>,
    router: Arc<AnalyticsRouter>,
}

impl TradeRebuilder {
    pub fn new(repo: Arc<Repository>, router: Arc<AnalyticsRouter>) -> Self {
        TradeRebuilder { repo, router }
    }

    /// Rebuild the run's trades from its executions and orders.
    ///
    /// An empty reconstruction preserves any existing trades and returns 0.
    /// Cancellation is cooperative: the flag is polled between phases and
    /// per trade during the excursion pass.
    pub async fn rebuild_trades_for_run(
        &self,
        run_id: &str,
        cancel: &AtomicBool,
    ) -> Result<usize, AppError> {
        let executions = self.repo.fetch_executions(run_id).await?;
        let orders = self.repo.fetch_orders(run_id).await?;

        let reconstructed = reconstruct_trades(&executions, &orders);
        if reconstructed.is_empty() {
            info!(run_id = %run_id, "reconstruction produced no closed trades, keeping existing");
            return Ok(0);
        }

        if cancel.load(Ordering::Relaxed) {
            info!(run_id = %run_id, "rebuild canceled before trade replacement");
            return Ok(0);
        }

        let regime = self.regime_series_for_run(run_id).await?;

        let trades: Vec<Trade> = reconstructed
            .into_iter()
            .map(|r| {
                let (trend, volatility) = regime_at_entry(&regime, r.entry_utc);
                Trade {
                    id: Uuid::new_v4().to_string(),
                    run_id: run_id.to_string(),
                    symbol: r.symbol,
                    side: r.side,
                    entry_utc: r.entry_utc,
                    exit_utc: r.exit_utc,
                    entry_price: r.entry_price,
                    exit_price: r.exit_price,
                    qty: r.qty,
                    pnl_gross: r.pnl_gross,
                    pnl_net: r.pnl_net,
                    commission: r.commission,
                    duration_secs: r.duration_secs,
                    mae: None,
                    mfe: None,
                    regime_trend: trend,
                    regime_volatility: volatility,
                    extras: None,
                }
            })
            .collect();

        let written = self.repo.replace_trades(run_id, &trades).await?;

        let kind = self.router.strategy_kind_for_run(run_id).await?;
        let metrics = self.router.route_analysis(run_id, kind).await?;
        let metrics_json = serde_json::to_value(&metrics)
            .map_err(|e| AppError::Internal(format!("failed to serialize metrics: {}", e)))?;
        self.repo.update_run_metrics(run_id, &metrics_json).await?;

        // Per-trade excursions are best-effort; a failure is logged and the
        // rebuild still counts as successful.
        for trade in &trades {
            if cancel.load(Ordering::Relaxed) {
                info!(run_id = %run_id, "rebuild canceled during excursion pass");
                break;
            }
            if let Err(e) = self.router.calculate_trade_metrics(&trade.id, kind).await {
                warn!(
                    run_id = %run_id,
                    trade_id = %trade.id,
                    error = %e,
                    "per-trade excursion computation failed"
                );
            }
        }

        info!(run_id = %run_id, trades = written, "rebuild complete");
        Ok(written)
    }

    /// Compute the regime series over the run's primary market series,
    /// resolved through the run -> instance -> (symbol, timeframe) path.
    async fn regime_series_for_run(&self, run_id: &str) -> Result<Vec<RegimePoint>, AppError> {
        let run = match self.repo.get_run(run_id).await? {
            Some(run) => run,
            None => return Ok(Vec::new()),
        };
        let instance = match self.repo.get_instance(&run.instance_id).await? {
            Some(instance) => instance,
            None => return Ok(Vec::new()),
        };

        let series_id = match self
            .repo
            .find_series_for_run(
                run_id,
                instance.symbol.as_deref(),
                instance.timeframe.as_deref(),
            )
            .await?
        {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let bars = self.repo.fetch_bars(&series_id, None, None).await?;
        if bars.is_empty() {
            return Ok(Vec::new());
        }
        Ok(label_bars(&bars))
    }
}

/// Annotation of the latest bar at or before the entry time; absent
/// coverage yields no labels.
fn regime_at_entry(
    regime: &[RegimePoint],
    entry_utc: DateTime<Utc>,
) -> (Option<Trend>, Option<Volatility>) {
    let idx = regime.partition_point(|p| p.ts_utc <= entry_utc);
    if idx == 0 {
        (None, None)
    } else {
        let point = &regime[idx - 1];
        (Some(point.trend), Some(point.volatility))
    }
}
