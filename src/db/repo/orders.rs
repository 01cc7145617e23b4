//! Order upserts and queries.

use super::{from_ms, json_to_text, text_to_json, to_ms, Repository};
use crate::domain::{Order, OrderKind, OrderStatus, PositionImpact, Side, TimeInForce};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

/// Upsert one order on an existing connection or transaction. Identity is
/// (run id, order id); a collision updates status, quantity, prices,
/// position impact, and extras.
pub(crate) async fn upsert_order_conn(
    conn: &mut SqliteConnection,
    run_id: &str,
    order: &Order,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders
            (run_id, order_id, symbol, account_id, side, kind, tif, qty, price, stop_price,
             status, submit_utc_ms, update_utc_ms, position_impact, parent_order_id, extras)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id, order_id) DO UPDATE SET
            status = excluded.status,
            qty = excluded.qty,
            price = excluded.price,
            stop_price = excluded.stop_price,
            update_utc_ms = excluded.update_utc_ms,
            position_impact = excluded.position_impact,
            extras = excluded.extras
        "#,
    )
    .bind(run_id)
    .bind(&order.order_id)
    .bind(&order.symbol)
    .bind(&order.account_id)
    .bind(order.side.as_str())
    .bind(order.kind.as_str())
    .bind(order.tif.as_str())
    .bind(order.qty)
    .bind(order.price)
    .bind(order.stop_price)
    .bind(order.status.as_str())
    .bind(to_ms(&order.submit_utc))
    .bind(order.update_utc.as_ref().map(to_ms))
    .bind(order.position_impact.as_str())
    .bind(&order.parent_order_id)
    .bind(json_to_text(&order.extras))
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) fn map_order_row(row: &SqliteRow) -> Order {
    Order {
        order_id: row.get("order_id"),
        symbol: row.get("symbol"),
        account_id: row.get("account_id"),
        side: Side::parse(row.get::<String, _>("side").as_str()).unwrap_or(Side::Buy),
        kind: OrderKind::parse(row.get::<String, _>("kind").as_str()),
        tif: TimeInForce::parse(row.get::<String, _>("tif").as_str()),
        qty: row.get("qty"),
        price: row.get("price"),
        stop_price: row.get("stop_price"),
        status: OrderStatus::parse(row.get::<String, _>("status").as_str()),
        submit_utc: from_ms(row.get("submit_utc_ms")),
        update_utc: row.get::<Option<i64>, _>("update_utc_ms").map(from_ms),
        position_impact: PositionImpact::parse(
            row.get::<String, _>("position_impact").as_str(),
        ),
        parent_order_id: row.get("parent_order_id"),
        extras: text_to_json(row.get("extras"), "orders.extras"),
    }
}

impl Repository {
    pub async fn upsert_order(&self, run_id: &str, order: &Order) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        upsert_order_conn(&mut conn, run_id, order).await
    }

    /// Upsert a batch of (run id, order) pairs in one transaction. Rows are
    /// applied one at a time so later rows observe earlier rows' effects.
    pub async fn upsert_orders_batch(
        &self,
        items: &[(String, Order)],
    ) -> Result<usize, sqlx::Error> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        for (run_id, order) in items {
            upsert_order_conn(&mut *tx, run_id, order).await?;
        }
        tx.commit().await?;

        Ok(items.len())
    }

    /// Fetch a run's orders ordered by submit time ascending.
    pub async fn fetch_orders(&self, run_id: &str) -> Result<Vec<Order>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, symbol, account_id, side, kind, tif, qty, price, stop_price,
                   status, submit_utc_ms, update_utc_ms, position_impact, parent_order_id, extras
            FROM orders
            WHERE run_id = ?
            ORDER BY submit_utc_ms ASC, order_id ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_order_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{seed_run, setup_test_db};
    use super::*;

    fn make_order(order_id: &str, side: Side, qty: f64) -> Order {
        Order {
            order_id: order_id.to_string(),
            symbol: "ES".to_string(),
            account_id: None,
            side,
            kind: OrderKind::Market,
            tif: TimeInForce::Day,
            qty,
            price: None,
            stop_price: None,
            status: OrderStatus::New,
            submit_utc: from_ms(1_700_000_000_000),
            update_utc: None,
            position_impact: PositionImpact::Open,
            parent_order_id: None,
            extras: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_order_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let order = make_order("O1", Side::Buy, 1.0);
        repo.upsert_order("R1", &order).await.unwrap();
        repo.upsert_order("R1", &order).await.unwrap();

        let orders = repo.fetch_orders("R1").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0], order);
    }

    #[tokio::test]
    async fn test_upsert_order_collision_updates_status() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let mut order = make_order("O1", Side::Buy, 1.0);
        repo.upsert_order("R1", &order).await.unwrap();

        order.status = OrderStatus::Filled;
        order.qty = 2.0;
        repo.upsert_order("R1", &order).await.unwrap();

        let orders = repo.fetch_orders("R1").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Filled);
        assert!((orders[0].qty - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_same_order_id_in_different_runs() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;
        repo.upsert_run(&super::super::tests::make_run("R2", "I1"))
            .await
            .unwrap();

        let order = make_order("O1", Side::Buy, 1.0);
        repo.upsert_order("R1", &order).await.unwrap();
        repo.upsert_order("R2", &order).await.unwrap();

        assert_eq!(repo.fetch_orders("R1").await.unwrap().len(), 1);
        assert_eq!(repo.fetch_orders("R2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_orders_sorted_by_submit_time() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let mut late = make_order("O2", Side::Sell, 1.0);
        late.submit_utc = from_ms(1_700_000_300_000);
        let early = make_order("O1", Side::Buy, 1.0);

        repo.upsert_orders_batch(&[
            ("R1".to_string(), late),
            ("R1".to_string(), early),
        ])
        .await
        .unwrap();

        let orders = repo.fetch_orders("R1").await.unwrap();
        assert_eq!(orders[0].order_id, "O1");
        assert_eq!(orders[1].order_id, "O2");
    }
}
