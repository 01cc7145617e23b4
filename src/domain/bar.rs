//! OHLCV bars and their series identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Belongs to exactly one series; unique per
/// (series id, bar-start time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_utc: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Identity of a bar series. The series id is a deterministic digest of
/// the tuple so that independent producers converge on the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: String,
    pub venue: String,
    pub provider: String,
}

impl SeriesKey {
    pub fn new(symbol: &str, timeframe: &str, venue: &str, provider: &str) -> Self {
        SeriesKey {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            venue: venue.to_string(),
            provider: provider.to_string(),
        }
    }

    /// Stable series identifier: first 16 bytes of SHA-256 over the tuple,
    /// hex encoded. Field separators prevent ambiguous concatenations.
    pub fn series_id(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.timeframe.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.venue.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.provider.as_bytes());
        let hash = hasher.finalize();
        format!("series:{}", hex::encode(&hash[..16]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_id_deterministic() {
        let a = SeriesKey::new("ES", "1m", "CME", "sim");
        let b = SeriesKey::new("ES", "1m", "CME", "sim");
        assert_eq!(a.series_id(), b.series_id());
    }

    #[test]
    fn test_series_id_distinguishes_fields() {
        let a = SeriesKey::new("ES", "1m", "CME", "sim");
        let b = SeriesKey::new("ES", "1mC", "ME", "sim");
        assert_ne!(a.series_id(), b.series_id());
    }

    #[test]
    fn test_series_id_shape() {
        let id = SeriesKey::new("NQ", "5m", "CME", "live").series_id();
        assert!(id.starts_with("series:"));
        assert_eq!(id.len(), 7 + 32);
    }
}
