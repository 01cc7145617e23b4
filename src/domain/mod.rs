//! Domain types for strategy activity recording and trade reconstruction.
//!
//! This module provides:
//! - Closed enumerations with `Unknown` fallbacks for wire parsing
//! - Entity records: Strategy, StrategyInstance, StrategyRun, Order,
//!   Execution, Trade, Bar
//! - Deterministic series identifiers and execution ordering helpers

pub mod bar;
pub mod enums;
pub mod execution;
pub mod order;
pub mod ordering;
pub mod strategy;
pub mod trade;

pub use bar::{Bar, SeriesKey};
pub use enums::{
    Liquidity, OrderKind, OrderStatus, PositionImpact, RunKind, RunStatus, Side, TimeInForce,
    Trend, Volatility,
};
pub use execution::Execution;
pub use order::Order;
pub use ordering::{sort_executions_deterministic, ExecOrderingKey};
pub use strategy::{Strategy, StrategyInstance, StrategyRun};
pub use trade::Trade;
