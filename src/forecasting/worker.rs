// Per-SKU forecast worker: sanitize, guard, fit, predict, restore scale

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::debug;

use crate::config::EngineConfig;
use crate::features::ExogenousMatrix;
use crate::prep::{clamp_non_negative, sanitize_non_finite};

use super::metrics::ForecastMetrics;
use super::strategy::{create_strategy, resolve_auto, FitOptions, StrategyKind};
use super::types::{ForecastPackage, Series, SkuForecast, SkuForecastMeta};
use super::{ForecastError, ForecastResult};

/// Share of the series held out for accuracy metrics when there is room.
const METRICS_HOLDOUT_SHARE: f64 = 0.2;

/// Minimum exogenous/endogenous date overlap for features to be used.
const MIN_EXOG_OVERLAP: f64 = 0.5;

/// Why one SKU produced no forecast.
#[derive(Debug)]
pub(crate) enum WorkerError {
    /// Recorded in the skipped map; the run continues.
    Skipped(String),
    /// A strategy failure; fatal on the single-model path.
    Failed(ForecastError),
}

impl WorkerError {
    pub(crate) fn reason(&self) -> String {
        match self {
            WorkerError::Skipped(reason) => reason.clone(),
            WorkerError::Failed(err) => err.to_string(),
        }
    }
}

/// Fit and predict one SKU package.
///
/// Panics are caught only around the strategy calls; everything else in the
/// worker is expected to be panic-free.
pub(crate) fn forecast_package(
    package: &ForecastPackage,
    kind: StrategyKind,
    config: &EngineConfig,
) -> Result<SkuForecast, WorkerError> {
    let mut series = package.endogenous.clone();
    sanitize_non_finite(&mut series.values);

    if series.sum() == 0.0 {
        return Err(WorkerError::Skipped("series is all zeros".to_string()));
    }
    if series.len() < 2 {
        return Err(WorkerError::Skipped(format!(
            "insufficient data: {} periods",
            series.len()
        )));
    }

    // Leave the estimator's own validation enough training data.
    let min_train_percent =
        (1.0 - package.horizon_periods as f64 / series.len() as f64).max(0.5);
    let options = FitOptions {
        min_train_percent,
        prediction_interval: config.prediction_interval,
        seed: config.sample_seed.wrapping_add(sku_hash(&package.sku)),
    };

    // Features are only worth keeping when they cover most of the history.
    let (series, exogenous, future_exogenous) = align_exogenous(
        series,
        package.exogenous.as_ref(),
        package.future_exogenous.as_ref(),
    );
    let feature_count = exogenous.as_ref().map(|m| m.ncols()).unwrap_or(0);

    let kind = match kind {
        StrategyKind::Auto => resolve_auto(&series, package.granularity),
        other => other,
    };

    let metrics = holdout_metrics(
        &series,
        exogenous.as_ref(),
        kind,
        package.granularity,
        &options,
        config,
    );

    let fitted = run_strategy(
        &series,
        exogenous.as_ref(),
        future_exogenous.as_ref(),
        package,
        kind,
        &options,
    )?;
    let (mut bands, summary) = fitted;

    sanitize_non_finite(&mut bands.point);
    sanitize_non_finite(&mut bands.upper);
    sanitize_non_finite(&mut bands.lower);
    clamp_non_negative(&mut bands.point);
    clamp_non_negative(&mut bands.lower);

    // Bounds must bracket the point forecast.
    for i in 0..bands.point.len() {
        bands.upper[i] = bands.upper[i].max(bands.point[i]);
        bands.lower[i] = bands.lower[i].min(bands.point[i]);
    }

    let scale = crate::prep::MagnitudeScale::from_factor(package.scale_factor);
    scale.invert_all(&mut bands.point);
    scale.invert_all(&mut bands.upper);
    scale.invert_all(&mut bands.lower);

    if bands.point.len() != package.future_dates.len() {
        return Err(WorkerError::Failed(ForecastError::InternalError(format!(
            "strategy produced {} periods, expected {}",
            bands.point.len(),
            package.future_dates.len()
        ))));
    }

    debug!(sku = %package.sku, model = %summary.model_name, "forecast complete");

    Ok(SkuForecast {
        sku: package.sku.clone(),
        dates: package.future_dates.clone(),
        point: bands.point,
        upper: bands.upper,
        lower: bands.lower,
        metadata: SkuForecastMeta {
            data_points_used: series.len(),
            feature_count,
            seasonality_detected: summary.seasonality_detected,
            seasonal_period: summary.seasonal_period,
            model_name: summary.model_name,
            metrics,
        },
    })
}

/// The fit/predict adapter boundary: the only place panics are converted
/// into errors.
fn run_strategy(
    series: &Series,
    exogenous: Option<&ExogenousMatrix>,
    future_exogenous: Option<&ExogenousMatrix>,
    package: &ForecastPackage,
    kind: StrategyKind,
    options: &FitOptions,
) -> Result<(super::strategy::PredictionBands, super::strategy::FitSummary), WorkerError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> ForecastResult<_> {
        let mut strategy = create_strategy(kind)?;
        strategy.fit(
            series,
            exogenous,
            package.horizon_periods,
            package.granularity,
            options,
        )?;
        let bands = strategy.predict(future_exogenous)?;
        Ok((bands, strategy.fit_summary()))
    }));

    match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(WorkerError::Failed(err)),
        Err(panic) => Err(WorkerError::Failed(ForecastError::StrategyError(format!(
            "strategy panicked: {}",
            panic_message(&panic)
        )))),
    }
}

/// Intersect the endogenous and exogenous indices when they overlap enough;
/// otherwise drop the features entirely.
fn align_exogenous(
    series: Series,
    exogenous: Option<&ExogenousMatrix>,
    future_exogenous: Option<&ExogenousMatrix>,
) -> (Series, Option<ExogenousMatrix>, Option<ExogenousMatrix>) {
    let Some(exog) = exogenous else {
        return (series, None, None);
    };

    let shared: Vec<chrono::NaiveDate> = series
        .dates
        .iter()
        .filter(|d| exog.dates.contains(*d))
        .copied()
        .collect();
    if (shared.len() as f64) < MIN_EXOG_OVERLAP * series.len() as f64 {
        return (series, None, None);
    }
    let restricted_series = series.restrict_to_dates(&shared);
    let restricted_exog = exog.restrict_to_dates(&shared);

    (
        restricted_series,
        Some(restricted_exog),
        future_exogenous.cloned(),
    )
}

/// Fit on a prefix and score the held-out suffix, when the series has room.
fn holdout_metrics(
    series: &Series,
    exogenous: Option<&ExogenousMatrix>,
    kind: StrategyKind,
    granularity: super::types::Granularity,
    options: &FitOptions,
    config: &EngineConfig,
) -> Option<ForecastMetrics> {
    let len = series.len();
    let holdout = ((len as f64 * METRICS_HOLDOUT_SHARE).floor() as usize)
        .min(len.saturating_sub((len as f64 * options.min_train_percent).ceil() as usize));
    if holdout < 2 {
        return None;
    }
    let train_len = len - holdout;
    if train_len < config.min_data_points.min(len.saturating_sub(holdout)) {
        return None;
    }

    let train = series.head(train_len);
    let actual = series.tail_from(train_len);
    let train_exog = exogenous.map(|m| m.restrict_to_dates(&train.dates));
    let holdout_exog = exogenous.map(|m| m.restrict_to_dates(&actual.dates));

    let outcome = catch_unwind(AssertUnwindSafe(|| -> ForecastResult<_> {
        let mut strategy = create_strategy(kind)?;
        strategy.fit(&train, train_exog.as_ref(), holdout, granularity, options)?;
        strategy.predict(holdout_exog.as_ref())
    }));

    match outcome {
        Ok(Ok(bands)) => ForecastMetrics::new(&actual.values, &bands.point).ok(),
        _ => None,
    }
}

fn sku_hash(sku: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    sku.hash(&mut hasher);
    hasher.finish()
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
