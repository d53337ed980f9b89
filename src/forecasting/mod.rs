// Forecasting: strategy abstraction, per-SKU workers, parallel dispatcher

pub mod dispatcher;
pub mod metrics;
pub mod models;
pub mod strategy;
pub mod types;
pub(crate) mod worker;

pub use dispatcher::{ForecastDispatcher, RunOutcome, RunRequest};
pub use metrics::{calculate_mae, calculate_mape, calculate_rmse, ForecastMetrics};
pub use models::{ExponentialSmoothingStrategy, SeasonalNaiveStrategy};
pub use strategy::{
    create_strategy, resolve_auto, FitOptions, FitSummary, ForecastStrategy, PredictionBands,
    StrategyKind,
};
pub use types::{
    days_to_periods, CancellationFlag, ForecastBundle, ForecastPackage, Granularity, Series,
    SkippedSku, SkuForecast, SkuForecastMeta,
};

/// Forecasting error types
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Strategy error: {0}")]
    StrategyError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;
