// Engine configuration: thresholds, budgets, and policy knobs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{Result, StockSightError};

/// How duplicate `(date, sku)` rows are reduced to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    Sum,
    Mean,
    Last,
}

/// How negative quantities in raw input are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativePolicy {
    /// Fail validation with an issue per offending column.
    Reject,
    /// Take the absolute value during cleaning.
    Absolutize,
}

/// How missing days inside a SKU's observed range are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave the grid sparse.
    None,
    /// Carry the last observed quantity forward.
    ForwardFill,
    /// Insert explicit zero-quantity days.
    ZeroFill,
}

/// How encoded features are extrapolated over the forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationPolicy {
    /// Hold the last observed encoded row constant.
    HoldLast,
    /// Use the mean of the observed encoded rows.
    Mean,
}

/// All tunable thresholds and policies consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum per-SKU row count; smaller SKUs are dropped during cleaning.
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,

    /// Minimum per-SKU non-null share for a feature to be admissible.
    #[serde(default = "default_min_feature_coverage")]
    pub min_feature_coverage: f64,

    /// Minimum squared coefficient of variation for numeric features.
    #[serde(default = "default_min_feature_variance")]
    pub min_feature_variance: f64,

    /// Row count above which the frame is downsampled.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Target row count after downsampling.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Downsampling keeps the most recent rows instead of sampling uniformly.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: bool,

    /// Distinct-SKU count above which only the top sellers are kept.
    #[serde(default = "default_max_skus")]
    pub max_skus: usize,

    /// Quantile width of the forecast bounds.
    #[serde(default = "default_prediction_interval")]
    pub prediction_interval: f64,

    #[serde(default = "default_min_spike")]
    pub min_spike: f64,

    #[serde(default = "default_max_spike")]
    pub max_spike: f64,

    #[serde(default = "default_min_delay_days")]
    pub min_delay_days: i64,

    #[serde(default = "default_max_delay_days")]
    pub max_delay_days: i64,

    #[serde(default = "default_duplicate_policy")]
    pub duplicate_policy: DuplicatePolicy,

    #[serde(default = "default_negative_policy")]
    pub negative_policy: NegativePolicy,

    #[serde(default = "default_fill_policy")]
    pub fill_policy: FillPolicy,

    #[serde(default = "default_extrapolation_policy")]
    pub extrapolation_policy: ExtrapolationPolicy,

    /// Distinct-SKU count above which the parallel path is used.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Upper bound on worker threads; the pool size is min(cores, this).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Seed for row sampling and bootstrap intervals.
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,
}

fn default_min_data_points() -> usize {
    10
}

fn default_min_feature_coverage() -> f64 {
    0.5
}

fn default_min_feature_variance() -> f64 {
    0.01
}

fn default_max_rows() -> usize {
    500_000
}

fn default_sample_rows() -> usize {
    250_000
}

fn default_keep_recent() -> bool {
    true
}

fn default_max_skus() -> usize {
    500
}

fn default_prediction_interval() -> f64 {
    0.95
}

fn default_min_spike() -> f64 {
    0.1
}

fn default_max_spike() -> f64 {
    10.0
}

fn default_min_delay_days() -> i64 {
    0
}

fn default_max_delay_days() -> i64 {
    90
}

fn default_duplicate_policy() -> DuplicatePolicy {
    DuplicatePolicy::Sum
}

fn default_negative_policy() -> NegativePolicy {
    NegativePolicy::Reject
}

fn default_fill_policy() -> FillPolicy {
    FillPolicy::None
}

fn default_extrapolation_policy() -> ExtrapolationPolicy {
    ExtrapolationPolicy::HoldLast
}

fn default_parallel_threshold() -> usize {
    10
}

fn default_max_workers() -> usize {
    8
}

fn default_sample_seed() -> u64 {
    42
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_data_points: default_min_data_points(),
            min_feature_coverage: default_min_feature_coverage(),
            min_feature_variance: default_min_feature_variance(),
            max_rows: default_max_rows(),
            sample_rows: default_sample_rows(),
            keep_recent: default_keep_recent(),
            max_skus: default_max_skus(),
            prediction_interval: default_prediction_interval(),
            min_spike: default_min_spike(),
            max_spike: default_max_spike(),
            min_delay_days: default_min_delay_days(),
            max_delay_days: default_max_delay_days(),
            duplicate_policy: default_duplicate_policy(),
            negative_policy: default_negative_policy(),
            fill_policy: default_fill_policy(),
            extrapolation_policy: default_extrapolation_policy(),
            parallel_threshold: default_parallel_threshold(),
            max_workers: default_max_workers(),
            sample_seed: default_sample_seed(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.min_data_points == 0 {
            return Err(StockSightError::config("min_data_points must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_feature_coverage) {
            return Err(StockSightError::config(
                "min_feature_coverage must be in [0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.prediction_interval) {
            return Err(StockSightError::config(
                "prediction_interval must be in [0, 1)",
            ));
        }
        if self.sample_rows == 0 || self.sample_rows > self.max_rows {
            return Err(StockSightError::config(
                "sample_rows must be in (0, max_rows]",
            ));
        }
        if self.max_skus == 0 {
            return Err(StockSightError::config("max_skus must be at least 1"));
        }
        if self.min_spike <= 0.0 || self.max_spike < self.min_spike {
            return Err(StockSightError::config(
                "spike bounds must satisfy 0 < min_spike <= max_spike",
            ));
        }
        if self.max_delay_days < self.min_delay_days {
            return Err(StockSightError::config(
                "delay bounds must satisfy min_delay_days <= max_delay_days",
            ));
        }
        if self.max_workers == 0 {
            return Err(StockSightError::config("max_workers must be at least 1"));
        }
        Ok(())
    }

    /// The worker-pool size for this machine.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cores.min(self.max_workers)
    }
}
