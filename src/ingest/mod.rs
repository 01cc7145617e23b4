//! Ingestion: validates wire events, persists them, and schedules
//! rebuilds for runs whose executions changed.

pub mod events;

pub use events::{
    BarBatchEvent, BarEvent, ExecutionBatchEvent, ExecutionEvent, InstanceEvent, OrderBatchEvent,
    OrderEvent, RunEndEvent, RunStartEvent, StrategyEvent, StreamBatchEvent,
};

use crate::db::Repository;
use crate::domain::{RunStatus, SeriesKey, Strategy, StrategyInstance, StrategyRun};
use crate::error::AppError;
use crate::jobs::JobCoordinator;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Ingestor {
    repo: Arc<Repository>,
    jobs: Arc<JobCoordinator>,
}

impl Ingestor {
    pub fn new(repo: Arc<Repository>, jobs: Arc<JobCoordinator>) -> Self {
        Ingestor { repo, jobs }
    }

    pub async fn apply_strategy(&self, event: StrategyEvent) -> Result<Strategy, AppError> {
        events::validate_strategy(&event)?;
        let strategy = Strategy {
            id: event.id,
            name: event.name,
            version: event.version,
            vendor: event.vendor,
            source_ref: event.source_ref,
            kind: event.kind,
            params_schema: event.params_schema.map(events::normalize_json),
            notes: event.notes,
            created_utc: Utc::now(),
        };
        self.repo.upsert_strategy(&strategy).await?;
        debug!(strategy_id = %strategy.id, "strategy upserted");
        Ok(strategy)
    }

    pub async fn apply_instance(
        &self,
        event: InstanceEvent,
    ) -> Result<StrategyInstance, AppError> {
        events::validate_instance(&event)?;
        if self.repo.get_strategy(&event.strategy_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "unknown strategy {}",
                event.strategy_id
            )));
        }
        let instance = StrategyInstance {
            id: event.id,
            strategy_id: event.strategy_id,
            name: event.name,
            params: event.params.map(events::normalize_json),
            symbol: event.symbol,
            timeframe: event.timeframe,
            account_id: event.account_id,
            venue: event.venue,
            created_utc: Utc::now(),
        };
        self.repo.upsert_instance(&instance).await?;
        debug!(instance_id = %instance.id, "instance upserted");
        Ok(instance)
    }

    pub async fn apply_run_start(&self, event: RunStartEvent) -> Result<StrategyRun, AppError> {
        events::validate_run_start(&event)?;
        if self.repo.get_instance(&event.instance_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "unknown instance {}",
                event.instance_id
            )));
        }
        let run = StrategyRun {
            id: event.id,
            instance_id: event.instance_id,
            kind: event.kind,
            status: RunStatus::Running,
            start_utc: event.start_utc,
            end_utc: None,
            engine_version: event.engine_version,
            data_source: event.data_source,
            initial_balance: event.initial_balance,
            base_currency: event.base_currency,
            metrics_json: None,
            created_utc: Utc::now(),
        };
        self.repo.upsert_run(&run).await?;
        info!(run_id = %run.id, kind = %run.kind.as_str(), "run started");
        Ok(run)
    }

    /// Close a run and schedule its final rebuild.
    pub async fn apply_run_end(&self, event: RunEndEvent) -> Result<(), AppError> {
        let status = event.status.unwrap_or(RunStatus::Completed);
        let updated = self
            .repo
            .set_run_end(&event.run_id, status, event.end_utc)
            .await?;
        if !updated {
            return Err(AppError::NotFound(format!("run {}", event.run_id)));
        }
        info!(run_id = %event.run_id, status = %status.as_str(), "run ended");
        self.jobs.enqueue(&event.run_id);
        Ok(())
    }

    pub async fn apply_order(&self, event: OrderEvent) -> Result<(), AppError> {
        events::validate_order(&event.order)?;
        self.require_run(&event.run_id).await?;
        self.repo.upsert_order(&event.run_id, &event.order).await?;
        Ok(())
    }

    pub async fn apply_orders(&self, event: OrderBatchEvent) -> Result<usize, AppError> {
        for order in &event.orders {
            events::validate_order(order)?;
        }
        self.require_run(&event.run_id).await?;
        let items: Vec<(String, crate::domain::Order)> = event
            .orders
            .into_iter()
            .map(|o| (event.run_id.clone(), o))
            .collect();
        Ok(self.repo.upsert_orders_batch(&items).await?)
    }

    /// Persist one execution and schedule a rebuild of its run.
    pub async fn apply_execution(&self, event: ExecutionEvent) -> Result<(), AppError> {
        events::validate_execution(&event.execution)?;
        self.require_run(&event.run_id).await?;
        self.repo
            .upsert_execution(&event.run_id, &event.execution)
            .await?;
        self.jobs.enqueue(&event.run_id);
        Ok(())
    }

    pub async fn apply_executions(&self, event: ExecutionBatchEvent) -> Result<usize, AppError> {
        for exec in &event.executions {
            events::validate_execution(exec)?;
        }
        self.require_run(&event.run_id).await?;
        let items: Vec<(String, crate::domain::Execution)> = event
            .executions
            .into_iter()
            .map(|e| (event.run_id.clone(), e))
            .collect();
        let written = self.repo.upsert_executions_batch(&items).await?;
        if written > 0 {
            self.jobs.enqueue(&event.run_id);
        }
        Ok(written)
    }

    /// Persist a bar batch, creating the series on first sighting and
    /// linking it to the run when one is named.
    pub async fn apply_bars(&self, event: BarBatchEvent) -> Result<usize, AppError> {
        events::validate_bar_batch(&event)?;
        let key = SeriesKey::new(&event.symbol, &event.timeframe, &event.venue, &event.provider);
        let series_id = self.repo.ensure_series(&key).await?;
        if let Some(run_id) = &event.run_id {
            self.require_run(run_id).await?;
            self.repo.ensure_run_series_link(run_id, &series_id).await?;
        }
        let written = self.repo.upsert_bars_batch(&series_id, &event.bars).await?;
        debug!(series_id = %series_id, bars = written, "bars upserted");
        Ok(written)
    }

    /// Apply a mixed batch: orders and executions land in one transaction
    /// and schedule a single rebuild; bars follow per series.
    pub async fn apply_stream(&self, event: StreamBatchEvent) -> Result<(), AppError> {
        for order in &event.orders {
            events::validate_order(order)?;
        }
        for exec in &event.executions {
            events::validate_execution(exec)?;
        }
        for bars in &event.bars {
            events::validate_bar_batch(bars)?;
        }
        self.require_run(&event.run_id).await?;

        let had_executions = !event.executions.is_empty();
        let orders: Vec<(String, crate::domain::Order)> = event
            .orders
            .into_iter()
            .map(|o| (event.run_id.clone(), o))
            .collect();
        let executions: Vec<(String, crate::domain::Execution)> = event
            .executions
            .into_iter()
            .map(|e| (event.run_id.clone(), e))
            .collect();
        self.repo.apply_stream_batch(&orders, &executions).await?;

        // The executions are committed at this point; a bar failure below
        // must not drop the rebuild.
        if had_executions {
            self.jobs.enqueue(&event.run_id);
        }

        for mut bars in event.bars {
            bars.run_id.get_or_insert_with(|| event.run_id.clone());
            self.apply_bars(bars).await?;
        }
        Ok(())
    }

    async fn require_run(&self, run_id: &str) -> Result<(), AppError> {
        if self.repo.get_run(run_id).await?.is_none() {
            return Err(AppError::BadRequest(format!("unknown run {}", run_id)));
        }
        Ok(())
    }
}
