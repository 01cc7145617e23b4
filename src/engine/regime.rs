//! Market regime labeling: per-bar trend and volatility classes.

use crate::domain::{Bar, Trend, Volatility};
use chrono::{DateTime, Utc};

const TREND_FAST_WINDOW: usize = 50;
const TREND_SLOW_WINDOW: usize = 200;
const BBW_WINDOW: usize = 20;
const PERCENTILE_WINDOW: usize = 500;
const PCT_LOW: f64 = 0.20;
const PCT_HIGH: f64 = 0.80;

/// Regime annotation for a single bar. Transient; never persisted on its
/// own, only joined onto trades at rebuild time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimePoint {
    pub ts_utc: DateTime<Utc>,
    pub trend: Trend,
    pub volatility: Volatility,
}

/// Label every bar with a (trend, volatility) pair.
///
/// Bars with insufficient window history get the neutral labels
/// (RANGE, NORMAL). The output has the same length and timestamp order
/// as the input.
pub fn label_bars(bars: &[Bar]) -> Vec<RegimePoint> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let mut bbw_history: Vec<f64> = Vec::with_capacity(bars.len());
    let mut out = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let trend = trend_label(&closes, i);
        let volatility = match bbw_at(&closes, i) {
            Some(bbw) => {
                bbw_history.push(bbw);
                let window_start = bbw_history.len().saturating_sub(PERCENTILE_WINDOW);
                let window = &bbw_history[window_start..];
                let p20 = percentile(window, PCT_LOW);
                let p80 = percentile(window, PCT_HIGH);
                if bbw > p80 {
                    Volatility::High
                } else if bbw < p20 {
                    Volatility::Low
                } else {
                    Volatility::Normal
                }
            }
            None => Volatility::Normal,
        };

        out.push(RegimePoint {
            ts_utc: bar.ts_utc,
            trend,
            volatility,
        });
    }

    out
}

fn trend_label(closes: &[f64], i: usize) -> Trend {
    if i + 1 < TREND_SLOW_WINDOW {
        return Trend::Range;
    }
    let sma50 = mean(&closes[i + 1 - TREND_FAST_WINDOW..=i]);
    let sma200 = mean(&closes[i + 1 - TREND_SLOW_WINDOW..=i]);
    let close = closes[i];
    if close > sma50 && sma50 > sma200 {
        Trend::Bull
    } else if close < sma50 && sma50 < sma200 {
        Trend::Bear
    } else {
        Trend::Range
    }
}

/// Bollinger-band-width proxy: 4 * std20 / mean20. Undefined while the
/// 20-bar window is short or the mean is zero.
fn bbw_at(closes: &[f64], i: usize) -> Option<f64> {
    if i + 1 < BBW_WINDOW {
        return None;
    }
    let window = &closes[i + 1 - BBW_WINDOW..=i];
    let mu = mean(window);
    if mu == 0.0 {
        return None;
    }
    let sigma = std_dev(window, mu);
    Some(4.0 * sigma / mu)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mu: f64) -> f64 {
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolation percentile over an unsorted window.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
