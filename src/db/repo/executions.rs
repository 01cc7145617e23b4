//! Execution upserts and queries, plus the mixed stream batch.

use super::orders::upsert_order_conn;
use super::{from_ms, json_to_text, text_to_json, to_ms, Repository};
use crate::domain::{Execution, Liquidity, Order, PositionImpact};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

/// Upsert one execution on an existing connection or transaction.
/// Identity is (run id, exec id); a collision updates the numeric fields
/// and extras.
pub(crate) async fn upsert_execution_conn(
    conn: &mut SqliteConnection,
    run_id: &str,
    exec: &Execution,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO executions
            (run_id, exec_id, order_id, exec_utc_ms, price, qty, fee, fee_currency,
             liquidity, position_impact, extras)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id, exec_id) DO UPDATE SET
            price = excluded.price,
            qty = excluded.qty,
            fee = excluded.fee,
            fee_currency = excluded.fee_currency,
            liquidity = excluded.liquidity,
            position_impact = excluded.position_impact,
            extras = excluded.extras
        "#,
    )
    .bind(run_id)
    .bind(&exec.exec_id)
    .bind(&exec.order_id)
    .bind(to_ms(&exec.exec_utc))
    .bind(exec.price)
    .bind(exec.qty)
    .bind(exec.fee)
    .bind(&exec.fee_currency)
    .bind(exec.liquidity.as_str())
    .bind(exec.position_impact.as_str())
    .bind(json_to_text(&exec.extras))
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) fn map_execution_row(row: &SqliteRow) -> Execution {
    Execution {
        exec_id: row.get("exec_id"),
        order_id: row.get("order_id"),
        exec_utc: from_ms(row.get("exec_utc_ms")),
        price: row.get("price"),
        qty: row.get("qty"),
        fee: row.get("fee"),
        fee_currency: row.get("fee_currency"),
        liquidity: Liquidity::parse(row.get::<String, _>("liquidity").as_str()),
        position_impact: PositionImpact::parse(
            row.get::<String, _>("position_impact").as_str(),
        ),
        extras: text_to_json(row.get("extras"), "executions.extras"),
    }
}

impl Repository {
    pub async fn upsert_execution(
        &self,
        run_id: &str,
        exec: &Execution,
    ) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        upsert_execution_conn(&mut conn, run_id, exec).await
    }

    /// Upsert a batch of (run id, execution) pairs in one transaction.
    pub async fn upsert_executions_batch(
        &self,
        items: &[(String, Execution)],
    ) -> Result<usize, sqlx::Error> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        for (run_id, exec) in items {
            upsert_execution_conn(&mut *tx, run_id, exec).await?;
        }
        tx.commit().await?;

        Ok(items.len())
    }

    /// Apply one stream envelope (orders then executions) in a single
    /// transaction. A failure anywhere rolls back the whole batch.
    pub async fn apply_stream_batch(
        &self,
        orders: &[(String, Order)],
        executions: &[(String, Execution)],
    ) -> Result<(), sqlx::Error> {
        if orders.is_empty() && executions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for (run_id, order) in orders {
            upsert_order_conn(&mut *tx, run_id, order).await?;
        }
        for (run_id, exec) in executions {
            upsert_execution_conn(&mut *tx, run_id, exec).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Fetch a run's executions ordered by event time ascending.
    pub async fn fetch_executions(&self, run_id: &str) -> Result<Vec<Execution>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT exec_id, order_id, exec_utc_ms, price, qty, fee, fee_currency,
                   liquidity, position_impact, extras
            FROM executions
            WHERE run_id = ?
            ORDER BY exec_utc_ms ASC, exec_id ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_execution_row).collect())
    }

    /// Fetch a run's executions inside an optional time window.
    pub async fn fetch_executions_window(
        &self,
        run_id: &str,
        from_ms_bound: Option<i64>,
        to_ms_bound: Option<i64>,
    ) -> Result<Vec<Execution>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT exec_id, order_id, exec_utc_ms, price, qty, fee, fee_currency,
                   liquidity, position_impact, extras
            FROM executions
            WHERE run_id = ?
              AND exec_utc_ms >= COALESCE(?, -9223372036854775808)
              AND exec_utc_ms <= COALESCE(?, 9223372036854775807)
            ORDER BY exec_utc_ms ASC, exec_id ASC
            "#,
        )
        .bind(run_id)
        .bind(from_ms_bound)
        .bind(to_ms_bound)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_execution_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{seed_run, setup_test_db};
    use super::*;

    fn make_exec(exec_id: &str, order_id: &str, ms: i64, price: f64, qty: f64) -> Execution {
        Execution {
            exec_id: exec_id.to_string(),
            order_id: order_id.to_string(),
            exec_utc: from_ms(ms),
            price,
            qty,
            fee: 0.5,
            fee_currency: Some("USD".to_string()),
            liquidity: Liquidity::Taker,
            position_impact: PositionImpact::Unknown,
            extras: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_execution_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let exec = make_exec("E1", "O1", 1_700_000_000_000, 100.0, 1.0);
        repo.upsert_execution("R1", &exec).await.unwrap();
        repo.upsert_execution("R1", &exec).await.unwrap();

        let execs = repo.fetch_executions("R1").await.unwrap();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0], exec);
    }

    #[tokio::test]
    async fn test_collision_updates_numeric_fields() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let mut exec = make_exec("E1", "O1", 1_700_000_000_000, 100.0, 1.0);
        repo.upsert_execution("R1", &exec).await.unwrap();

        exec.price = 101.0;
        exec.fee = 1.25;
        repo.upsert_execution("R1", &exec).await.unwrap();

        let execs = repo.fetch_executions("R1").await.unwrap();
        assert_eq!(execs.len(), 1);
        assert!((execs[0].price - 101.0).abs() < 1e-9);
        assert!((execs[0].fee - 1.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_ordered_by_time() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        repo.upsert_executions_batch(&[
            ("R1".to_string(), make_exec("E2", "O1", 2_000, 100.0, 1.0)),
            ("R1".to_string(), make_exec("E1", "O1", 1_000, 100.0, 1.0)),
        ])
        .await
        .unwrap();

        let execs = repo.fetch_executions("R1").await.unwrap();
        assert_eq!(execs[0].exec_id, "E1");
        assert_eq!(execs[1].exec_id, "E2");
    }

    #[tokio::test]
    async fn test_window_fetch() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        repo.upsert_executions_batch(&[
            ("R1".to_string(), make_exec("E1", "O1", 1_000, 100.0, 1.0)),
            ("R1".to_string(), make_exec("E2", "O1", 2_000, 100.0, 1.0)),
            ("R1".to_string(), make_exec("E3", "O1", 3_000, 100.0, 1.0)),
        ])
        .await
        .unwrap();

        let execs = repo
            .fetch_executions_window("R1", Some(1_500), Some(2_500))
            .await
            .unwrap();
        assert_eq!(execs.len(), 1);
        assert_eq!(execs[0].exec_id, "E2");
    }

    #[tokio::test]
    async fn test_stream_batch_atomicity() {
        use crate::domain::{OrderKind, OrderStatus, Side, TimeInForce};

        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let order = Order {
            order_id: "O1".to_string(),
            symbol: "ES".to_string(),
            account_id: None,
            side: Side::Buy,
            kind: OrderKind::Market,
            tif: TimeInForce::Day,
            qty: 1.0,
            price: None,
            stop_price: None,
            status: OrderStatus::Filled,
            submit_utc: from_ms(1_000),
            update_utc: None,
            position_impact: PositionImpact::Open,
            parent_order_id: None,
            extras: None,
        };
        let exec = make_exec("E1", "O1", 1_500, 100.0, 1.0);

        repo.apply_stream_batch(
            &[("R1".to_string(), order)],
            &[("R1".to_string(), exec)],
        )
        .await
        .unwrap();

        assert_eq!(repo.fetch_orders("R1").await.unwrap().len(), 1);
        assert_eq!(repo.fetch_executions("R1").await.unwrap().len(), 1);
    }
}
