pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod rebuild;

pub use analytics::{AnalyticsRouter, RunMetrics, StrategyKind};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Bar, Execution, Order, RunKind, RunStatus, SeriesKey, Side, Strategy, StrategyInstance,
    StrategyRun, Trade, Trend, Volatility,
};
pub use error::AppError;
pub use ingest::Ingestor;
pub use jobs::JobCoordinator;
pub use rebuild::TradeRebuilder;
