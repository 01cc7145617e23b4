//! Per-trade maximum adverse/favorable excursion from bar highs and lows.

use crate::domain::{Bar, Side};

/// Compute (mae, mfe) against the entry price over the trade's bar
/// coverage. Returns None when no bars cover the trade window; both
/// values are clamped to be non-negative.
pub fn compute_excursions(side: Side, entry_price: f64, bars: &[Bar]) -> Option<(f64, f64)> {
    if bars.is_empty() {
        return None;
    }

    let max_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let min_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    let (mae, mfe) = match side {
        Side::Buy => (entry_price - min_low, max_high - entry_price),
        Side::Sell => (max_high - entry_price, entry_price - min_low),
    };

    Some((mae.max(0.0), mfe.max(0.0)))
}
