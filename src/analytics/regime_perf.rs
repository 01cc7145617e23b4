//! Regime performance: trade aggregates bucketed by market-state labels.

use crate::domain::{Trade, Trend, Volatility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate for one regime bucket. Buckets with no trades are
/// zero-filled, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BucketStats {
    pub pnl: f64,
    pub count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
}

/// The fixed-shape regime performance report: by trend, by volatility,
/// and the 3x3 trend x volatility matrix (keys "TREND|VOL").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimePerformance {
    pub by_trend: BTreeMap<String, BucketStats>,
    pub by_volatility: BTreeMap<String, BucketStats>,
    pub matrix: BTreeMap<String, BucketStats>,
}

pub fn aggregate_regime_performance(trades: &[Trade]) -> RegimePerformance {
    let mut by_trend: BTreeMap<String, Vec<f64>> = Trend::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), Vec::new()))
        .collect();
    let mut by_volatility: BTreeMap<String, Vec<f64>> = Volatility::ALL
        .iter()
        .map(|v| (v.as_str().to_string(), Vec::new()))
        .collect();
    let mut matrix: BTreeMap<String, Vec<f64>> = Trend::ALL
        .iter()
        .flat_map(|t| {
            Volatility::ALL
                .iter()
                .map(move |v| (format!("{}|{}", t.as_str(), v.as_str()), Vec::new()))
        })
        .collect();

    for trade in trades {
        if let Some(trend) = trade.regime_trend {
            if let Some(bucket) = by_trend.get_mut(trend.as_str()) {
                bucket.push(trade.pnl_net);
            }
        }
        if let Some(vol) = trade.regime_volatility {
            if let Some(bucket) = by_volatility.get_mut(vol.as_str()) {
                bucket.push(trade.pnl_net);
            }
        }
        if let (Some(trend), Some(vol)) = (trade.regime_trend, trade.regime_volatility) {
            let key = format!("{}|{}", trend.as_str(), vol.as_str());
            if let Some(bucket) = matrix.get_mut(&key) {
                bucket.push(trade.pnl_net);
            }
        }
    }

    RegimePerformance {
        by_trend: finalize(by_trend),
        by_volatility: finalize(by_volatility),
        matrix: finalize(matrix),
    }
}

fn finalize(buckets: BTreeMap<String, Vec<f64>>) -> BTreeMap<String, BucketStats> {
    buckets
        .into_iter()
        .map(|(key, pnls)| (key, stats_for(&pnls)))
        .collect()
}

fn stats_for(pnls: &[f64]) -> BucketStats {
    if pnls.is_empty() {
        return BucketStats::default();
    }

    let count = pnls.len();
    let wins = pnls.iter().filter(|p| **p > 0.0).count();
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = pnls.iter().filter(|p| **p <= 0.0).sum::<f64>().abs();

    BucketStats {
        pnl: pnls.iter().sum(),
        count,
        win_rate: wins as f64 / count as f64 * 100.0,
        profit_factor: if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use chrono::{TimeZone, Utc};

    fn make_trade(pnl: f64, trend: Option<Trend>, vol: Option<Volatility>) -> Trade {
        Trade {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: "R1".to_string(),
            symbol: "ES".to_string(),
            side: Side::Buy,
            entry_utc: Utc.timestamp_opt(0, 0).unwrap(),
            exit_utc: Utc.timestamp_opt(300, 0).unwrap(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            qty: 1.0,
            pnl_gross: pnl,
            pnl_net: pnl,
            commission: 0.0,
            duration_secs: 300.0,
            mae: None,
            mfe: None,
            regime_trend: trend,
            regime_volatility: vol,
            extras: None,
        }
    }

    #[test]
    fn test_fixed_shape_with_no_trades() {
        let perf = aggregate_regime_performance(&[]);
        assert_eq!(perf.by_trend.len(), 3);
        assert_eq!(perf.by_volatility.len(), 3);
        assert_eq!(perf.matrix.len(), 9);
        for stats in perf.matrix.values() {
            assert_eq!(*stats, BucketStats::default());
        }
    }

    #[test]
    fn test_bucketing_and_matrix_total() {
        let trades = vec![
            make_trade(10.0, Some(Trend::Bull), Some(Volatility::Normal)),
            make_trade(-5.0, Some(Trend::Bull), Some(Volatility::High)),
            make_trade(3.0, Some(Trend::Range), Some(Volatility::Low)),
        ];
        let perf = aggregate_regime_performance(&trades);

        let bull = &perf.by_trend["BULL"];
        assert_eq!(bull.count, 2);
        assert!((bull.pnl - 5.0).abs() < 1e-9);
        assert!((bull.win_rate - 50.0).abs() < 1e-9);
        assert!((bull.profit_factor - 2.0).abs() < 1e-9);

        let matrix_total: usize = perf.matrix.values().map(|s| s.count).sum();
        assert_eq!(matrix_total, trades.len());

        // Empty buckets still present with zero counts.
        assert_eq!(perf.by_trend["BEAR"].count, 0);
        assert_eq!(perf.matrix["BEAR|LOW"].count, 0);
    }

    #[test]
    fn test_unlabeled_trades_not_bucketed() {
        let trades = vec![make_trade(10.0, None, None)];
        let perf = aggregate_regime_performance(&trades);
        let total: usize = perf.by_trend.values().map(|s| s.count).sum();
        assert_eq!(total, 0);
    }
}
