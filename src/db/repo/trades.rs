//! Trade replacement, queries, and excursion updates.
//!
//! Trades are derived state: `replace_trades` deletes and re-inserts a
//! run's full trade set in one transaction.

use super::{from_ms, json_to_text, text_to_json, to_ms, Repository};
use crate::domain::{Side, Trade, Trend, Volatility};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn map_trade_row(row: &SqliteRow) -> Trade {
    Trade {
        id: row.get("id"),
        run_id: row.get("run_id"),
        symbol: row.get("symbol"),
        side: Side::parse(row.get::<String, _>("side").as_str()).unwrap_or(Side::Buy),
        entry_utc: from_ms(row.get("entry_utc_ms")),
        exit_utc: from_ms(row.get("exit_utc_ms")),
        entry_price: row.get("entry_price"),
        exit_price: row.get("exit_price"),
        qty: row.get("qty"),
        pnl_gross: row.get("pnl_gross"),
        pnl_net: row.get("pnl_net"),
        commission: row.get("commission"),
        duration_secs: row.get("duration_secs"),
        mae: row.get("mae"),
        mfe: row.get("mfe"),
        regime_trend: row
            .get::<Option<String>, _>("regime_trend")
            .and_then(|s| Trend::parse(&s)),
        regime_volatility: row
            .get::<Option<String>, _>("regime_volatility")
            .and_then(|s| Volatility::parse(&s)),
        extras: text_to_json(row.get("extras"), "trades.extras"),
    }
}

impl Repository {
    /// Delete-then-insert the run's full trade set in a single
    /// transaction. Readers never observe a partial set.
    pub async fn replace_trades(
        &self,
        run_id: &str,
        trades: &[Trade],
    ) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM trades WHERE run_id = ?")
            .bind(run_id)
            .execute(&mut *tx)
            .await?;

        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO trades
                    (id, run_id, symbol, side, entry_utc_ms, exit_utc_ms, entry_price, exit_price,
                     qty, pnl_gross, pnl_net, commission, duration_secs, mae, mfe,
                     regime_trend, regime_volatility, extras)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&trade.id)
            .bind(run_id)
            .bind(&trade.symbol)
            .bind(trade.side.as_str())
            .bind(to_ms(&trade.entry_utc))
            .bind(to_ms(&trade.exit_utc))
            .bind(trade.entry_price)
            .bind(trade.exit_price)
            .bind(trade.qty)
            .bind(trade.pnl_gross)
            .bind(trade.pnl_net)
            .bind(trade.commission)
            .bind(trade.duration_secs)
            .bind(trade.mae)
            .bind(trade.mfe)
            .bind(trade.regime_trend.map(|t| t.as_str()))
            .bind(trade.regime_volatility.map(|v| v.as_str()))
            .bind(json_to_text(&trade.extras))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(trades.len())
    }

    /// Fetch a run's trades inside an optional exit-time window,
    /// ascending by exit time.
    pub async fn fetch_trades(
        &self,
        run_id: &str,
        from_ms_bound: Option<i64>,
        to_ms_bound: Option<i64>,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, run_id, symbol, side, entry_utc_ms, exit_utc_ms, entry_price, exit_price,
                   qty, pnl_gross, pnl_net, commission, duration_secs, mae, mfe,
                   regime_trend, regime_volatility, extras
            FROM trades
            WHERE run_id = ?
              AND exit_utc_ms >= COALESCE(?, -9223372036854775808)
              AND exit_utc_ms <= COALESCE(?, 9223372036854775807)
            ORDER BY exit_utc_ms ASC, id ASC
            "#,
        )
        .bind(run_id)
        .bind(from_ms_bound)
        .bind(to_ms_bound)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_trade_row).collect())
    }

    pub async fn fetch_trade(&self, trade_id: &str) -> Result<Option<Trade>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, run_id, symbol, side, entry_utc_ms, exit_utc_ms, entry_price, exit_price,
                   qty, pnl_gross, pnl_net, commission, duration_secs, mae, mfe,
                   regime_trend, regime_volatility, extras
            FROM trades WHERE id = ?
            "#,
        )
        .bind(trade_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(map_trade_row))
    }

    /// Persist per-trade MAE/MFE.
    pub async fn update_trade_excursions(
        &self,
        trade_id: &str,
        mae: Option<f64>,
        mfe: Option<f64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE trades SET mae = ?, mfe = ? WHERE id = ?")
            .bind(mae)
            .bind(mfe)
            .bind(trade_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{seed_run, setup_test_db};
    use super::*;

    fn make_trade(id: &str, run_id: &str, exit_ms: i64, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            run_id: run_id.to_string(),
            symbol: "ES".to_string(),
            side: Side::Buy,
            entry_utc: from_ms(exit_ms - 300_000),
            exit_utc: from_ms(exit_ms),
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            qty: 1.0,
            pnl_gross: pnl,
            pnl_net: pnl,
            commission: 0.0,
            duration_secs: 300.0,
            mae: None,
            mfe: None,
            regime_trend: Some(Trend::Bull),
            regime_volatility: Some(Volatility::Normal),
            extras: None,
        }
    }

    #[tokio::test]
    async fn test_replace_trades_atomic_swap() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        repo.replace_trades("R1", &[make_trade("t1", "R1", 1_000, 5.0)])
            .await
            .unwrap();
        repo.replace_trades(
            "R1",
            &[
                make_trade("t2", "R1", 2_000, 3.0),
                make_trade("t3", "R1", 3_000, -1.0),
            ],
        )
        .await
        .unwrap();

        let trades = repo.fetch_trades("R1", None, None).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.id != "t1"));
    }

    #[tokio::test]
    async fn test_replace_trades_scoped_to_run() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;
        repo.upsert_run(&super::super::tests::make_run("R2", "I1"))
            .await
            .unwrap();

        repo.replace_trades("R1", &[make_trade("t1", "R1", 1_000, 5.0)])
            .await
            .unwrap();
        repo.replace_trades("R2", &[make_trade("t2", "R2", 1_000, 5.0)])
            .await
            .unwrap();

        // Replacing R2 must not disturb R1's trades.
        repo.replace_trades("R2", &[]).await.unwrap();
        assert_eq!(repo.fetch_trades("R1", None, None).await.unwrap().len(), 1);
        assert_eq!(repo.fetch_trades("R2", None, None).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_trades_window() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        repo.replace_trades(
            "R1",
            &[
                make_trade("t1", "R1", 1_000, 1.0),
                make_trade("t2", "R1", 2_000, 2.0),
                make_trade("t3", "R1", 3_000, 3.0),
            ],
        )
        .await
        .unwrap();

        let trades = repo
            .fetch_trades("R1", Some(1_500), Some(2_500))
            .await
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, "t2");
    }

    #[tokio::test]
    async fn test_update_trade_excursions() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        repo.replace_trades("R1", &[make_trade("t1", "R1", 1_000, 5.0)])
            .await
            .unwrap();

        let updated = repo
            .update_trade_excursions("t1", Some(2.5), Some(7.0))
            .await
            .unwrap();
        assert!(updated);

        let trade = repo.fetch_trade("t1").await.unwrap().unwrap();
        assert_eq!(trade.mae, Some(2.5));
        assert_eq!(trade.mfe, Some(7.0));
    }

    #[tokio::test]
    async fn test_regime_labels_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let mut trade = make_trade("t1", "R1", 1_000, 5.0);
        trade.regime_trend = Some(Trend::Bear);
        trade.regime_volatility = Some(Volatility::High);
        repo.replace_trades("R1", &[trade]).await.unwrap();

        let stored = repo.fetch_trade("t1").await.unwrap().unwrap();
        assert_eq!(stored.regime_trend, Some(Trend::Bear));
        assert_eq!(stored.regime_volatility, Some(Volatility::High));
    }
}
