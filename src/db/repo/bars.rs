//! Bar series identity, run links, and bar upserts/queries.

use super::{from_ms, to_ms, Repository};
use crate::domain::{Bar, SeriesKey};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

pub(crate) async fn upsert_bar_conn(
    conn: &mut SqliteConnection,
    series_id: &str,
    bar: &Bar,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO bars (series_id, ts_utc_ms, open, high, low, close, volume)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(series_id, ts_utc_ms) DO UPDATE SET
            open = excluded.open,
            high = excluded.high,
            low = excluded.low,
            close = excluded.close,
            volume = excluded.volume
        "#,
    )
    .bind(series_id)
    .bind(to_ms(&bar.ts_utc))
    .bind(bar.open)
    .bind(bar.high)
    .bind(bar.low)
    .bind(bar.close)
    .bind(bar.volume)
    .execute(conn)
    .await?;

    Ok(())
}

fn map_bar_row(row: &SqliteRow) -> Bar {
    Bar {
        ts_utc: from_ms(row.get("ts_utc_ms")),
        open: row.get("open"),
        high: row.get("high"),
        low: row.get("low"),
        close: row.get("close"),
        volume: row.get("volume"),
    }
}

impl Repository {
    /// Ensure the series row exists and return its deterministic id.
    pub async fn ensure_series(&self, key: &SeriesKey) -> Result<String, sqlx::Error> {
        let series_id = key.series_id();
        sqlx::query(
            r#"
            INSERT INTO bar_series (id, symbol, timeframe, venue, provider)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timeframe, venue, provider) DO NOTHING
            "#,
        )
        .bind(&series_id)
        .bind(&key.symbol)
        .bind(&key.timeframe)
        .bind(&key.venue)
        .bind(&key.provider)
        .execute(self.pool())
        .await?;

        Ok(series_id)
    }

    /// Link a run to a series; idempotent.
    pub async fn ensure_run_series_link(
        &self,
        run_id: &str,
        series_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO run_series (run_id, series_id)
            VALUES (?, ?)
            ON CONFLICT(run_id, series_id) DO NOTHING
            "#,
        )
        .bind(run_id)
        .bind(series_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn upsert_bar(&self, series_id: &str, bar: &Bar) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        upsert_bar_conn(&mut conn, series_id, bar).await
    }

    /// Upsert a batch of bars for one series in a single transaction.
    pub async fn upsert_bars_batch(
        &self,
        series_id: &str,
        bars: &[Bar],
    ) -> Result<usize, sqlx::Error> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        for bar in bars {
            upsert_bar_conn(&mut *tx, series_id, bar).await?;
        }
        tx.commit().await?;

        Ok(bars.len())
    }

    /// Fetch a series' bars inside an optional time window, ascending.
    pub async fn fetch_bars(
        &self,
        series_id: &str,
        from_ms_bound: Option<i64>,
        to_ms_bound: Option<i64>,
    ) -> Result<Vec<Bar>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT ts_utc_ms, open, high, low, close, volume
            FROM bars
            WHERE series_id = ?
              AND ts_utc_ms >= COALESCE(?, -9223372036854775808)
              AND ts_utc_ms <= COALESCE(?, 9223372036854775807)
            ORDER BY ts_utc_ms ASC
            "#,
        )
        .bind(series_id)
        .bind(from_ms_bound)
        .bind(to_ms_bound)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_bar_row).collect())
    }

    /// Resolve the run's primary series: a linked series matching the
    /// instance's (symbol, timeframe) when given, otherwise the first
    /// linked series.
    pub async fn find_series_for_run(
        &self,
        run_id: &str,
        symbol: Option<&str>,
        timeframe: Option<&str>,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT s.id
            FROM bar_series s
            JOIN run_series rs ON rs.series_id = s.id
            WHERE rs.run_id = ?
              AND (? IS NULL OR s.symbol = ?)
              AND (? IS NULL OR s.timeframe = ?)
            ORDER BY s.id ASC
            LIMIT 1
            "#,
        )
        .bind(run_id)
        .bind(symbol)
        .bind(symbol)
        .bind(timeframe)
        .bind(timeframe)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Fetch bars across all of a run's linked series inside a window,
    /// ascending by time.
    pub async fn fetch_run_bars(
        &self,
        run_id: &str,
        from_ms_bound: Option<i64>,
        to_ms_bound: Option<i64>,
    ) -> Result<Vec<Bar>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT b.ts_utc_ms, b.open, b.high, b.low, b.close, b.volume
            FROM bars b
            JOIN run_series rs ON rs.series_id = b.series_id
            WHERE rs.run_id = ?
              AND b.ts_utc_ms >= COALESCE(?, -9223372036854775808)
              AND b.ts_utc_ms <= COALESCE(?, 9223372036854775807)
            ORDER BY b.ts_utc_ms ASC
            "#,
        )
        .bind(run_id)
        .bind(from_ms_bound)
        .bind(to_ms_bound)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_bar_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{seed_run, setup_test_db};
    use super::*;

    fn make_bar(ms: i64, close: f64) -> Bar {
        Bar {
            ts_utc: from_ms(ms),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
        }
    }

    #[tokio::test]
    async fn test_ensure_series_idempotent() {
        let (repo, _temp) = setup_test_db().await;

        let key = SeriesKey::new("ES", "1m", "CME", "sim");
        let id1 = repo.ensure_series(&key).await.unwrap();
        let id2 = repo.ensure_series(&key).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1, key.series_id());
    }

    #[tokio::test]
    async fn test_bar_upsert_by_series_and_time() {
        let (repo, _temp) = setup_test_db().await;

        let key = SeriesKey::new("ES", "1m", "CME", "sim");
        let series_id = repo.ensure_series(&key).await.unwrap();

        repo.upsert_bar(&series_id, &make_bar(60_000, 100.0))
            .await
            .unwrap();
        repo.upsert_bar(&series_id, &make_bar(60_000, 101.0))
            .await
            .unwrap();

        let bars = repo.fetch_bars(&series_id, None, None).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].close - 101.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_bars_window_ascending() {
        let (repo, _temp) = setup_test_db().await;

        let key = SeriesKey::new("ES", "1m", "CME", "sim");
        let series_id = repo.ensure_series(&key).await.unwrap();
        repo.upsert_bars_batch(
            &series_id,
            &[make_bar(180_000, 3.0), make_bar(60_000, 1.0), make_bar(120_000, 2.0)],
        )
        .await
        .unwrap();

        let bars = repo
            .fetch_bars(&series_id, Some(60_000), Some(120_000))
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].ts_utc < bars[1].ts_utc);
    }

    #[tokio::test]
    async fn test_run_series_link_and_lookup() {
        let (repo, _temp) = setup_test_db().await;
        seed_run(&repo, "R1").await;

        let key = SeriesKey::new("ES", "1m", "CME", "sim");
        let series_id = repo.ensure_series(&key).await.unwrap();
        repo.ensure_run_series_link("R1", &series_id).await.unwrap();
        repo.ensure_run_series_link("R1", &series_id).await.unwrap();

        let found = repo
            .find_series_for_run("R1", Some("ES"), Some("1m"))
            .await
            .unwrap();
        assert_eq!(found, Some(series_id.clone()));

        let none = repo
            .find_series_for_run("R1", Some("NQ"), None)
            .await
            .unwrap();
        assert!(none.is_none());

        let any = repo.find_series_for_run("R1", None, None).await.unwrap();
        assert_eq!(any, Some(series_id));
    }
}
