//! StockSight - Demand forecasting engine for tabular inventory histories
//!
//! This library ingests a per-day, per-SKU inventory history, fits per-SKU
//! encoders over whatever auxiliary columns each SKU can support, and fans
//! out per-SKU forecasts with symmetric prediction intervals behind a
//! pluggable estimator strategy. What-if rewrites of the history and
//! temporal re-aggregation of both histories and forecasts sit on top of
//! the same cleaned-data contract.

pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod export;
pub mod features;
pub mod forecasting;
pub mod ingest;
pub mod observability;
pub mod prep;
pub mod regroup;
pub mod scenario;
pub mod session;

// Re-export commonly used types
pub use domain::{
    AuxColumn, AuxValue, CleanFrame, DateFormat, Result, SkuSummary, StockSightError,
};

pub use config::{
    DuplicatePolicy, EngineConfig, ExtrapolationPolicy, FillPolicy, NegativePolicy,
};

pub use ingest::{
    clean, detect_columns, detect_date_format, load, load_sheet, validate, CleanReport,
    ColumnMapping, IngestError, LoadOutcome, RawTable, SheetInfo, SuggestedMapping,
    ValidationReport,
};

pub use features::{
    EncoderManager, EncoderManifestEntry, ExogenousMatrix, FeatureEncoding, FeatureRejection,
    RejectionReason, SkuEncoder,
};

pub use forecasting::{
    days_to_periods, CancellationFlag, ForecastBundle, ForecastDispatcher, ForecastError,
    ForecastMetrics, ForecastStrategy, Granularity, RunOutcome, RunRequest, Series, SkippedSku,
    SkuForecast, SkuForecastMeta, StrategyKind,
};

pub use prep::{BudgetAction, MagnitudeScale};

pub use regroup::{aggregate_frame, regroup_bundle};

pub use scenario::{apply_scenario, Scenario, ScenarioError, ScenarioRecord};

pub use session::{RunStatus, Session, SessionError};

pub use export::{
    load_model, save_model, write_bundle, BundleFiles, ExportError, ModelHeader, PersistedModel,
    MODEL_MAGIC,
};

pub use diagnostics::RunDiagnostics;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    observability::init_tracing();
}
