//! Closed enumerations shared across the wire schema and the store.
//!
//! Wire parsing maps unknown strings to the `Unknown` variant instead of
//! failing; the analyzers treat `Unknown` as a neutral element.

use serde::{Deserialize, Serialize};

/// Direction of an order. The entry side of a reconstructed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }

    /// +1 for BUY entries, -1 for SELL entries.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
    StopLimit,
    Mit,
    #[serde(other)]
    #[default]
    Unknown,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit => "LIMIT",
            OrderKind::Stop => "STOP",
            OrderKind::StopLimit => "STOP_LIMIT",
            OrderKind::Mit => "MIT",
            OrderKind::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> OrderKind {
        match s {
            "MARKET" => OrderKind::Market,
            "LIMIT" => OrderKind::Limit,
            "STOP" => OrderKind::Stop,
            "STOP_LIMIT" => OrderKind::StopLimit,
            "MIT" => OrderKind::Mit,
            _ => OrderKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
    Gtd,
    #[serde(other)]
    #[default]
    Unknown,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Day => "DAY",
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Gtd => "GTD",
            TimeInForce::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> TimeInForce {
        match s {
            "DAY" => TimeInForce::Day,
            "GTC" => TimeInForce::Gtc,
            "IOC" => TimeInForce::Ioc,
            "FOK" => TimeInForce::Fok,
            "GTD" => TimeInForce::Gtd,
            _ => TimeInForce::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Working,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    #[serde(other)]
    #[default]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Working => "WORKING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> OrderStatus {
        match s {
            "NEW" => OrderStatus::New,
            "WORKING" => OrderStatus::Working,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" => OrderStatus::Expired,
            _ => OrderStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionImpact {
    Open,
    Close,
    Reduce,
    Reverse,
    #[serde(other)]
    #[default]
    Unknown,
}

impl PositionImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionImpact::Open => "OPEN",
            PositionImpact::Close => "CLOSE",
            PositionImpact::Reduce => "REDUCE",
            PositionImpact::Reverse => "REVERSE",
            PositionImpact::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> PositionImpact {
        match s {
            "OPEN" => PositionImpact::Open,
            "CLOSE" => PositionImpact::Close,
            "REDUCE" => PositionImpact::Reduce,
            "REVERSE" => PositionImpact::Reverse,
            _ => PositionImpact::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liquidity {
    Maker,
    Taker,
    #[serde(other)]
    #[default]
    Unknown,
}

impl Liquidity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liquidity::Maker => "MAKER",
            Liquidity::Taker => "TAKER",
            Liquidity::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Liquidity {
        match s {
            "MAKER" => Liquidity::Maker,
            "TAKER" => Liquidity::Taker,
            _ => Liquidity::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunKind {
    Backtest,
    Live,
    Paper,
    Replay,
    #[serde(other)]
    #[default]
    Unknown,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Backtest => "BACKTEST",
            RunKind::Live => "LIVE",
            RunKind::Paper => "PAPER",
            RunKind::Replay => "REPLAY",
            RunKind::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> RunKind {
        match s {
            "BACKTEST" => RunKind::Backtest,
            "LIVE" => RunKind::Live,
            "PAPER" => RunKind::Paper,
            "REPLAY" => RunKind::Replay,
            _ => RunKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> RunStatus {
        match s {
            "COMPLETED" => RunStatus::Completed,
            "FAILED" => RunStatus::Failed,
            "CANCELED" => RunStatus::Canceled,
            _ => RunStatus::Running,
        }
    }
}

/// Trend class of a market regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Bull,
    Bear,
    Range,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Bull => "BULL",
            Trend::Bear => "BEAR",
            Trend::Range => "RANGE",
        }
    }

    pub fn parse(s: &str) -> Option<Trend> {
        match s {
            "BULL" => Some(Trend::Bull),
            "BEAR" => Some(Trend::Bear),
            "RANGE" => Some(Trend::Range),
            _ => None,
        }
    }

    pub const ALL: [Trend; 3] = [Trend::Bull, Trend::Bear, Trend::Range];
}

/// Volatility class of a market regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    High,
    Normal,
    Low,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::High => "HIGH",
            Volatility::Normal => "NORMAL",
            Volatility::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Volatility> {
        match s {
            "HIGH" => Some(Volatility::High),
            "NORMAL" => Some(Volatility::Normal),
            "LOW" => Some(Volatility::Low),
            _ => None,
        }
    }

    pub const ALL: [Volatility; 3] = [Volatility::High, Volatility::Normal, Volatility::Low];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1.0);
        assert_eq!(Side::Sell.sign(), -1.0);
    }

    #[test]
    fn test_unknown_fallback_on_parse() {
        assert_eq!(OrderKind::parse("ICEBERG"), OrderKind::Unknown);
        assert_eq!(OrderStatus::parse("TRIGGERED"), OrderStatus::Unknown);
        assert_eq!(PositionImpact::parse("weird"), PositionImpact::Unknown);
        assert_eq!(Liquidity::parse(""), Liquidity::Unknown);
    }

    #[test]
    fn test_wire_deserialization_unknown_fallback() {
        let kind: OrderKind = serde_json::from_str("\"ICEBERG\"").unwrap();
        assert_eq!(kind, OrderKind::Unknown);
        let status: OrderStatus = serde_json::from_str("\"TRIGGERED\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
    }

    #[test]
    fn test_roundtrip_as_str_parse() {
        for s in [OrderStatus::New, OrderStatus::PartiallyFilled, OrderStatus::Expired] {
            assert_eq!(OrderStatus::parse(s.as_str()), s);
        }
        for k in [RunKind::Backtest, RunKind::Live, RunKind::Paper, RunKind::Replay] {
            assert_eq!(RunKind::parse(k.as_str()), k);
        }
    }
}
