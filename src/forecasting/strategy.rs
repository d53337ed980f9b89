// Estimator abstraction: the dispatcher only sees this interface

use serde::{Deserialize, Serialize};

use crate::features::ExogenousMatrix;

use super::models::{ExponentialSmoothingStrategy, SeasonalNaiveStrategy};
use super::types::{Granularity, Series};
use super::{ForecastError, ForecastResult};

/// Knobs every strategy receives at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Floor on the share of the series a strategy may hold back for its
    /// own validation.
    pub min_train_percent: f64,
    /// Quantile width of the prediction interval, e.g. 0.95.
    pub prediction_interval: f64,
    /// Seed for any randomized step, so repeated fits agree.
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_train_percent: 0.5,
            prediction_interval: 0.95,
            seed: 42,
        }
    }
}

/// Point forecast plus interval bounds, one value per horizon period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBands {
    pub point: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// What a fitted strategy reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub model_name: String,
    pub seasonality_detected: bool,
    pub seasonal_period: Option<usize>,
}

/// The pluggable estimator interface.
///
/// Implementations must be time-bounded on their own; the dispatcher applies
/// no timeout around these calls.
pub trait ForecastStrategy: Send {
    fn name(&self) -> &'static str;

    /// Train on the endogenous series, optionally conditioning on a
    /// date-aligned exogenous matrix.
    fn fit(
        &mut self,
        endogenous: &Series,
        exogenous: Option<&ExogenousMatrix>,
        horizon: usize,
        granularity: Granularity,
        options: &FitOptions,
    ) -> ForecastResult<()>;

    /// Produce the horizon forecast with interval bounds.
    fn predict(&self, future_exogenous: Option<&ExogenousMatrix>) -> ForecastResult<PredictionBands>;

    fn fit_summary(&self) -> FitSummary;
}

/// Available strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SeasonalNaive,
    ExponentialSmoothing,
    /// Pick per SKU from the series shape.
    Auto,
}

/// Instantiate a concrete strategy. `Auto` must be resolved first.
pub fn create_strategy(kind: StrategyKind) -> ForecastResult<Box<dyn ForecastStrategy>> {
    match kind {
        StrategyKind::SeasonalNaive => Ok(Box::new(SeasonalNaiveStrategy::new())),
        StrategyKind::ExponentialSmoothing => {
            Ok(Box::new(ExponentialSmoothingStrategy::with_defaults()))
        }
        StrategyKind::Auto => Err(ForecastError::InvalidConfig(
            "Auto strategy should have been resolved".to_string(),
        )),
    }
}

/// Resolve `Auto` for one series.
///
/// A strong level shift between the halves favors the trend-following
/// smoother; otherwise a series long enough to show a full cycle gets the
/// seasonal baseline.
pub fn resolve_auto(series: &Series, granularity: Granularity) -> StrategyKind {
    let values = &series.values;
    if values.len() < 2 {
        return StrategyKind::ExponentialSmoothing;
    }

    let mid = values.len() / 2;
    let first_half = values[..mid].iter().sum::<f64>() / mid as f64;
    let second_half = values[mid..].iter().sum::<f64>() / (values.len() - mid) as f64;
    let trend_ratio = if first_half.abs() > f64::EPSILON {
        second_half / first_half
    } else {
        1.0
    };

    if !(0.95..=1.05).contains(&trend_ratio) {
        StrategyKind::ExponentialSmoothing
    } else if values.len() >= 2 * season_length(granularity) {
        StrategyKind::SeasonalNaive
    } else {
        StrategyKind::ExponentialSmoothing
    }
}

/// Seasonal cycle length in periods for each granularity.
pub(crate) fn season_length(granularity: Granularity) -> usize {
    match granularity {
        Granularity::Daily => 7,
        Granularity::Weekly => 52,
        Granularity::Monthly => 12,
        Granularity::Quarterly => 4,
    }
}

/// Z-score for the common interval widths.
pub(crate) fn z_score(prediction_interval: f64) -> f64 {
    match (prediction_interval * 100.0).round() as i32 {
        90 => 1.645,
        95 => 1.96,
        99 => 2.576,
        _ => 1.96,
    }
}
