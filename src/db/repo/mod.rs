//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all store operations.
//! Methods are organized across submodules by domain:
//! - `orders.rs` - order upserts and queries
//! - `executions.rs` - execution upserts and queries
//! - `bars.rs` - series identity, run links, bar upserts and queries
//! - `trades.rs` - trade replacement and excursion updates

mod bars;
mod executions;
mod orders;
mod trades;

use crate::domain::{RunKind, RunStatus, Strategy, StrategyInstance, StrategyRun};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::warn;

/// Repository for database operations.
///
/// Cheap to construct from a pool handle; background jobs build a fresh
/// one per job.
pub struct Repository {
    pool: SqlitePool,
}

pub(crate) fn to_ms(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn json_to_text(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

pub(crate) fn text_to_json(text: Option<String>, context: &str) -> Option<serde_json::Value> {
    let text = text?;
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(context = %context, error = %e, "failed to parse stored JSON, dropping");
            None
        }
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Strategy operations
    // =========================================================================

    /// Upsert a strategy by primary key; a second hit updates mutable
    /// fields and preserves the creation time.
    pub async fn upsert_strategy(&self, strategy: &Strategy) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO strategies (id, name, version, vendor, source_ref, kind, params_schema, notes, created_utc_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                vendor = excluded.vendor,
                source_ref = excluded.source_ref,
                kind = excluded.kind,
                params_schema = excluded.params_schema,
                notes = excluded.notes
            "#,
        )
        .bind(&strategy.id)
        .bind(&strategy.name)
        .bind(&strategy.version)
        .bind(&strategy.vendor)
        .bind(&strategy.source_ref)
        .bind(&strategy.kind)
        .bind(json_to_text(&strategy.params_schema))
        .bind(&strategy.notes)
        .bind(to_ms(&strategy.created_utc))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_strategy(&self, id: &str) -> Result<Option<Strategy>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, version, vendor, source_ref, kind, params_schema, notes, created_utc_ms FROM strategies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Strategy {
            id: r.get("id"),
            name: r.get("name"),
            version: r.get("version"),
            vendor: r.get("vendor"),
            source_ref: r.get("source_ref"),
            kind: r.get("kind"),
            params_schema: text_to_json(r.get("params_schema"), "strategies.params_schema"),
            notes: r.get("notes"),
            created_utc: from_ms(r.get("created_utc_ms")),
        }))
    }

    // =========================================================================
    // Instance operations
    // =========================================================================

    pub async fn upsert_instance(&self, instance: &StrategyInstance) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO strategy_instances (id, strategy_id, name, params, symbol, timeframe, account_id, venue, created_utc_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                params = excluded.params,
                symbol = excluded.symbol,
                timeframe = excluded.timeframe,
                account_id = excluded.account_id,
                venue = excluded.venue
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.strategy_id)
        .bind(&instance.name)
        .bind(json_to_text(&instance.params))
        .bind(&instance.symbol)
        .bind(&instance.timeframe)
        .bind(&instance.account_id)
        .bind(&instance.venue)
        .bind(to_ms(&instance.created_utc))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_instance(&self, id: &str) -> Result<Option<StrategyInstance>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, strategy_id, name, params, symbol, timeframe, account_id, venue, created_utc_ms FROM strategy_instances WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StrategyInstance {
            id: r.get("id"),
            strategy_id: r.get("strategy_id"),
            name: r.get("name"),
            params: text_to_json(r.get("params"), "strategy_instances.params"),
            symbol: r.get("symbol"),
            timeframe: r.get("timeframe"),
            account_id: r.get("account_id"),
            venue: r.get("venue"),
            created_utc: from_ms(r.get("created_utc_ms")),
        }))
    }

    // =========================================================================
    // Run operations
    // =========================================================================

    /// Upsert a run. Mutable fields update on collision; the metrics
    /// snapshot is owned by `update_run_metrics` and never touched here.
    pub async fn upsert_run(&self, run: &StrategyRun) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO strategy_runs
                (id, instance_id, kind, status, start_utc_ms, end_utc_ms, engine_version, data_source, initial_balance, base_currency, created_utc_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                status = excluded.status,
                start_utc_ms = excluded.start_utc_ms,
                end_utc_ms = excluded.end_utc_ms,
                engine_version = excluded.engine_version,
                data_source = excluded.data_source,
                initial_balance = excluded.initial_balance,
                base_currency = excluded.base_currency
            "#,
        )
        .bind(&run.id)
        .bind(&run.instance_id)
        .bind(run.kind.as_str())
        .bind(run.status.as_str())
        .bind(to_ms(&run.start_utc))
        .bind(run.end_utc.as_ref().map(to_ms))
        .bind(&run.engine_version)
        .bind(&run.data_source)
        .bind(run.initial_balance)
        .bind(&run.base_currency)
        .bind(to_ms(&run.created_utc))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_run(&self, id: &str) -> Result<Option<StrategyRun>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, instance_id, kind, status, start_utc_ms, end_utc_ms, engine_version,
                   data_source, initial_balance, base_currency, metrics_json, created_utc_ms
            FROM strategy_runs WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StrategyRun {
            id: r.get("id"),
            instance_id: r.get("instance_id"),
            kind: RunKind::parse(r.get::<String, _>("kind").as_str()),
            status: RunStatus::parse(r.get::<String, _>("status").as_str()),
            start_utc: from_ms(r.get("start_utc_ms")),
            end_utc: r.get::<Option<i64>, _>("end_utc_ms").map(from_ms),
            engine_version: r.get("engine_version"),
            data_source: r.get("data_source"),
            initial_balance: r.get("initial_balance"),
            base_currency: r.get("base_currency"),
            metrics_json: text_to_json(r.get("metrics_json"), "strategy_runs.metrics_json"),
            created_utc: from_ms(r.get("created_utc_ms")),
        }))
    }

    /// Transition a run to a terminal status with its end time.
    pub async fn set_run_end(
        &self,
        run_id: &str,
        status: RunStatus,
        end_utc: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE strategy_runs SET status = ?, end_utc_ms = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_ms(&end_utc))
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Advance a RUNNING run to CANCELED; no-op for any other status.
    pub async fn mark_run_canceled_if_running(&self, run_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE strategy_runs SET status = 'CANCELED' WHERE id = ? AND status = 'RUNNING'",
        )
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Partial update of the run's computed metrics snapshot.
    pub async fn update_run_metrics(
        &self,
        run_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE strategy_runs SET metrics_json = ? WHERE id = ?")
            .bind(metrics.to_string())
            .bind(run_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
