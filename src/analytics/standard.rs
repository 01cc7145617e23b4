//! Standard analyzer: the full portfolio/risk/execution metric set.

use crate::analytics::{AnalysisInput, Analyzer, StrategyKind};
use crate::domain::{Execution, Order, Side, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

const ANNUALIZATION: f64 = 252.0;
const MIN_SHAPE_SAMPLES: usize = 5;

/// One equity-curve point per closed trade, sorted by exit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub pnl: f64,
    pub drawdown: f64,
}

/// The complete run-level metric set. Every field is always present;
/// empty inputs produce the zero-filled default shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage in [0, 100].
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub average_trade: f64,
    pub net_profit: f64,
    /// Signed; zero or negative.
    pub max_drawdown: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub total_fees: f64,
    pub total_volume: f64,
    pub avg_fill_latency_secs: f64,
    pub fill_ratio: f64,
    pub avg_mae: f64,
    pub avg_mfe: f64,
    pub efficiency_ratio: f64,
    pub stability_r2: f64,
    pub pnl_skew: f64,
    pub pnl_kurtosis: f64,
    pub equity_curve: Vec<EquityPoint>,
}

/// The default analyzer; every strategy kind without a specialized
/// analyzer routes here.
pub struct StandardAnalyzer;

#[async_trait]
impl Analyzer for StandardAnalyzer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Standard
    }

    async fn analyze(&self, input: AnalysisInput<'_>) -> RunMetrics {
        compute_metrics(input.trades, input.executions, input.orders)
    }
}

/// Compute the full metric set from the reconstructed trades and the raw
/// fill/order stream. Pure; deterministic for a given input.
pub fn compute_metrics(
    trades: &[Trade],
    executions: &[Execution],
    orders: &[Order],
) -> RunMetrics {
    let mut metrics = RunMetrics::default();
    if trades.is_empty() && executions.is_empty() {
        return metrics;
    }

    let mut sorted: Vec<&Trade> = trades.iter().collect();
    sorted.sort_by_key(|t| (t.exit_utc, t.id.clone()));
    let pnls: Vec<f64> = sorted.iter().map(|t| t.pnl_net).collect();

    metrics.total_trades = sorted.len();
    metrics.winning_trades = pnls.iter().filter(|p| **p > 0.0).count();
    metrics.losing_trades = metrics.total_trades - metrics.winning_trades;
    if metrics.total_trades > 0 {
        metrics.win_rate = metrics.winning_trades as f64 / metrics.total_trades as f64 * 100.0;
    }

    metrics.gross_profit = pnls.iter().filter(|p| **p > 0.0).sum();
    metrics.gross_loss = pnls.iter().filter(|p| **p <= 0.0).sum::<f64>().abs();
    metrics.net_profit = pnls.iter().sum();
    metrics.profit_factor = if metrics.gross_loss > 0.0 {
        metrics.gross_profit / metrics.gross_loss
    } else if metrics.gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    if metrics.total_trades > 0 {
        metrics.average_trade = metrics.net_profit / metrics.total_trades as f64;
    }

    // Equity curve and drawdown over cumulative pnl, one point per trade.
    // Equity starts at zero, so the initial peak is the flat baseline.
    let mut cum = 0.0;
    let mut peak = 0.0_f64;
    let mut cum_pnls = Vec::with_capacity(sorted.len());
    for trade in &sorted {
        cum += trade.pnl_net;
        peak = peak.max(cum);
        let drawdown = cum - peak;
        metrics.max_drawdown = metrics.max_drawdown.min(drawdown);
        metrics.equity_curve.push(EquityPoint {
            time: trade.exit_utc,
            pnl: cum,
            drawdown,
        });
        cum_pnls.push(cum);
    }

    // Expectancy uses fractional win rate with mean win/loss magnitudes.
    let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p <= 0.0).collect();
    if metrics.total_trades > 0 {
        let p_win = metrics.winning_trades as f64 / metrics.total_trades as f64;
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        metrics.expectancy = p_win * avg_win - (1.0 - p_win) * avg_loss.abs();
    }

    let (max_wins, max_losses) = longest_streaks(&pnls);
    metrics.max_consecutive_wins = max_wins;
    metrics.max_consecutive_losses = max_losses;

    // Performance ratios; all default to zero on empty or degenerate input.
    let pnl_std = sample_std(&pnls);
    if pnl_std > 0.0 {
        metrics.sharpe_ratio = mean(&pnls) / pnl_std * ANNUALIZATION.sqrt();
    }
    let neg: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
    let downside_std = sample_std(&neg);
    if downside_std > 0.0 {
        metrics.sortino_ratio = mean(&pnls) / downside_std * ANNUALIZATION.sqrt();
    }
    if metrics.max_drawdown < 0.0 {
        metrics.calmar_ratio = metrics.net_profit / metrics.max_drawdown.abs();
    }

    // Execution analytics from the raw fill/order stream.
    metrics.total_fees = executions.iter().map(|e| e.fee).sum();
    metrics.total_volume = executions.iter().map(|e| e.price * e.qty).sum();

    let order_index: HashMap<&str, &Order> =
        orders.iter().map(|o| (o.order_id.as_str(), o)).collect();
    let mut latency_sum = 0.0;
    let mut latency_count = 0usize;
    for exec in executions {
        if let Some(order) = order_index.get(exec.order_id.as_str()) {
            let delta = (exec.exec_utc - order.submit_utc).num_milliseconds() as f64 / 1000.0;
            if delta >= 0.0 {
                latency_sum += delta;
                latency_count += 1;
            } else {
                warn!(
                    exec_id = %exec.exec_id,
                    order_id = %exec.order_id,
                    "execution precedes order submit time"
                );
            }
        }
    }
    if latency_count > 0 {
        metrics.avg_fill_latency_secs = latency_sum / latency_count as f64;
    }

    let ordered_qty: f64 = orders.iter().map(|o| o.qty).sum();
    let executed_qty: f64 = executions.iter().map(|e| e.qty).sum();
    if ordered_qty > 0.0 {
        metrics.fill_ratio = executed_qty / ordered_qty;
    }

    // Excursion aggregates, null-tolerant.
    let maes: Vec<f64> = sorted.iter().filter_map(|t| t.mae).collect();
    let mfes: Vec<f64> = sorted.iter().filter_map(|t| t.mfe).collect();
    metrics.avg_mae = mean(&maes);
    metrics.avg_mfe = mean(&mfes);

    let mut captured_sum = 0.0;
    let mut mfe_sum = 0.0;
    for trade in &sorted {
        let mfe = match trade.mfe {
            Some(v) if v > 0.0 => v,
            _ => continue,
        };
        let captured = match trade.side {
            Side::Buy => trade.exit_price - trade.entry_price,
            Side::Sell => trade.entry_price - trade.exit_price,
        };
        captured_sum += captured * trade.qty;
        mfe_sum += mfe * trade.qty;
    }
    if mfe_sum > 0.0 {
        metrics.efficiency_ratio = captured_sum / mfe_sum;
    }

    // Shape statistics.
    if cum_pnls.len() >= 2 {
        let indices: Vec<f64> = (0..cum_pnls.len()).map(|i| i as f64).collect();
        let corr = correlation(&indices, &cum_pnls);
        metrics.stability_r2 = corr * corr;
    }
    if pnls.len() >= MIN_SHAPE_SAMPLES {
        metrics.pnl_skew = sample_skew(&pnls);
        metrics.pnl_kurtosis = sample_excess_kurtosis(&pnls);
    }

    metrics
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (Bessel corrected); zero for fewer than two
/// samples.
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

fn longest_streaks(pnls: &[f64]) -> (usize, usize) {
    let mut max_wins = 0usize;
    let mut max_losses = 0usize;
    let mut wins = 0usize;
    let mut losses = 0usize;
    for pnl in pnls {
        if *pnl > 0.0 {
            wins += 1;
            losses = 0;
        } else {
            losses += 1;
            wins = 0;
        }
        max_wins = max_wins.max(wins);
        max_losses = max_losses.max(losses);
    }
    (max_wins, max_losses)
}

fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return 0.0;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = xs[i] - mx;
        let dy = ys[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Adjusted Fisher-Pearson sample skewness.
fn sample_skew(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let s = sample_std(values);
    if s == 0.0 {
        return 0.0;
    }
    let mu = mean(values);
    let m3: f64 = values.iter().map(|v| ((v - mu) / s).powi(3)).sum();
    n / ((n - 1.0) * (n - 2.0)) * m3
}

/// Sample excess kurtosis with bias correction.
fn sample_excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let s = sample_std(values);
    if s == 0.0 {
        return 0.0;
    }
    let mu = mean(values);
    let m4: f64 = values.iter().map(|v| ((v - mu) / s).powi(4)).sum();
    n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0)) * m4
        - 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}
