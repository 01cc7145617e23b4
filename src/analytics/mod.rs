//! Analytics: metric computation and analyzer dispatch.
//!
//! The router holds a registry keyed by strategy kind; kinds without a
//! specialized analyzer fall back to the standard one, never fail.

pub mod excursions;
pub mod regime_perf;
pub mod standard;

pub use excursions::compute_excursions;
pub use regime_perf::{aggregate_regime_performance, BucketStats, RegimePerformance};
pub use standard::{compute_metrics, EquityPoint, RunMetrics, StandardAnalyzer};

use crate::db::Repository;
use crate::domain::{Execution, Order, Trade};
use crate::error::AppError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Dispatch tag for analyzer selection. Parsed from the strategy record;
/// unknown tags land on `Unknown` which routes to the default analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
    #[default]
    Standard,
    Momentum,
    MeanReversion,
    Unknown,
}

impl StrategyKind {
    pub fn parse(s: &str) -> StrategyKind {
        match s {
            "STANDARD" => StrategyKind::Standard,
            "MOMENTUM" => StrategyKind::Momentum,
            "MEAN_REVERSION" => StrategyKind::MeanReversion,
            _ => StrategyKind::Unknown,
        }
    }
}

/// Everything an analyzer may inspect for a run-level computation.
pub struct AnalysisInput<'a> {
    pub trades: &'a [Trade],
    pub executions: &'a [Execution],
    pub orders: &'a [Order],
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> StrategyKind;
    async fn analyze(&self, input: AnalysisInput<'_>) -> RunMetrics;
}

/// Routes metric computations to the analyzer registered for a strategy
/// kind, defaulting to the standard analyzer.
pub struct AnalyticsRouter {
    repo: Arc<Repository>,
    registry: HashMap<StrategyKind, Arc<dyn Analyzer>>,
    default_analyzer: Arc<dyn Analyzer>,
}

impl AnalyticsRouter {
    pub fn new(repo: Arc<Repository>) -> Self {
        let default_analyzer: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer);
        let mut registry: HashMap<StrategyKind, Arc<dyn Analyzer>> = HashMap::new();
        registry.insert(StrategyKind::Standard, default_analyzer.clone());

        AnalyticsRouter {
            repo,
            registry,
            default_analyzer,
        }
    }

    fn analyzer_for(&self, kind: StrategyKind) -> &Arc<dyn Analyzer> {
        self.registry.get(&kind).unwrap_or(&self.default_analyzer)
    }

    /// Resolve the dispatch tag for a run by walking run -> instance ->
    /// strategy. Missing links degrade to the default kind.
    pub async fn strategy_kind_for_run(&self, run_id: &str) -> Result<StrategyKind, AppError> {
        let run = match self.repo.get_run(run_id).await? {
            Some(run) => run,
            None => return Ok(StrategyKind::Standard),
        };
        let instance = match self.repo.get_instance(&run.instance_id).await? {
            Some(instance) => instance,
            None => return Ok(StrategyKind::Standard),
        };
        let strategy = self.repo.get_strategy(&instance.strategy_id).await?;
        Ok(strategy
            .and_then(|s| s.kind)
            .map(|k| StrategyKind::parse(&k))
            .unwrap_or_default())
    }

    /// Compute run-level metrics for the selected analyzer.
    pub async fn route_analysis(
        &self,
        run_id: &str,
        kind: StrategyKind,
    ) -> Result<RunMetrics, AppError> {
        let trades = self.repo.fetch_trades(run_id, None, None).await?;
        let executions = self.repo.fetch_executions(run_id).await?;
        let orders = self.repo.fetch_orders(run_id).await?;

        let input = AnalysisInput {
            trades: &trades,
            executions: &executions,
            orders: &orders,
        };
        Ok(self.analyzer_for(kind).analyze(input).await)
    }

    /// Compute and persist per-trade MAE/MFE from the run's bar coverage.
    /// Leaves the excursions null when no bars cover the trade window.
    pub async fn calculate_trade_metrics(
        &self,
        trade_id: &str,
        _kind: StrategyKind,
    ) -> Result<(), AppError> {
        let trade = self
            .repo
            .fetch_trade(trade_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))?;

        let series_id = match self
            .repo
            .find_series_for_run(&trade.run_id, Some(&trade.symbol), None)
            .await?
        {
            Some(id) => id,
            None => {
                warn!(
                    trade_id = %trade_id,
                    symbol = %trade.symbol,
                    "no linked bar series for trade, leaving excursions null"
                );
                return Ok(());
            }
        };

        let bars = self
            .repo
            .fetch_bars(
                &series_id,
                Some(trade.entry_utc.timestamp_millis()),
                Some(trade.exit_utc.timestamp_millis()),
            )
            .await?;

        if let Some((mae, mfe)) = compute_excursions(trade.side, trade.entry_price, &bars) {
            self.repo
                .update_trade_excursions(trade_id, Some(mae), Some(mfe))
                .await?;
        }

        Ok(())
    }
}
