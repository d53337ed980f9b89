// Forecast dispatcher: per-SKU fan-out with cancellation and isolation

use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::diagnostics::RunDiagnostics;
use crate::domain::CleanFrame;
use crate::features::EncoderManager;
use crate::prep::{apply_row_budget, apply_sku_budget, downcast_value, MagnitudeScale};
use crate::regroup::{aggregate_frame, aggregate_matrix_mean};

use super::strategy::StrategyKind;
use super::types::{
    days_to_periods, CancellationFlag, ForecastBundle, ForecastPackage, Granularity, Series,
    SkippedSku, SkuForecast,
};
use super::worker::{forecast_package, WorkerError};
use super::{ForecastError, ForecastResult};

/// One forecast request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Horizon in days; converted to periods of the granularity.
    pub horizon_days: u32,
    pub granularity: Granularity,
    pub strategy: StrategyKind,
    /// Auxiliary columns offered to the EncoderManager; `None` offers all.
    pub candidate_features: Option<Vec<String>>,
}

impl RunRequest {
    pub fn new(horizon_days: u32, granularity: Granularity) -> Self {
        Self {
            horizon_days,
            granularity,
            strategy: StrategyKind::Auto,
            candidate_features: None,
        }
    }
}

/// How a run ended. Cancellation is an outcome, not an error.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        bundle: ForecastBundle,
        diagnostics: RunDiagnostics,
    },
    Cancelled,
}

/// Orchestrates the per-SKU fit-predict fan-out.
pub struct ForecastDispatcher {
    config: EngineConfig,
}

impl ForecastDispatcher {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a forecast over the frame.
    ///
    /// The frame is read-only for the duration of the run; the bundle is
    /// returned (published) only when every SKU has completed or been
    /// skipped. The cancellation flag is observed before size reduction,
    /// after encoder fitting, and between worker waves.
    pub fn run(
        &self,
        frame: &CleanFrame,
        request: &RunRequest,
        cancel: &CancellationFlag,
    ) -> ForecastResult<RunOutcome> {
        if request.horizon_days == 0 {
            return Err(ForecastError::InvalidConfig(
                "Horizon must be at least 1 day".to_string(),
            ));
        }
        if frame.is_empty() {
            return Err(ForecastError::InsufficientData(
                "Frame has no rows".to_string(),
            ));
        }

        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = Uuid::new_v4();
        let input_rows = frame.len();
        let input_skus = frame.sku_count();

        info!(
            %run_id,
            horizon_days = request.horizon_days,
            granularity = %request.granularity,
            rows = input_rows,
            skus = input_skus,
            "starting forecast run"
        );

        if cancel.is_cancelled() {
            info!(%run_id, "run cancelled before size reduction");
            return Ok(RunOutcome::Cancelled);
        }

        // Size budgets, magnitude scaling, precision downcast.
        let (frame, row_budget) = apply_row_budget(frame, &self.config);
        let (mut frame, sku_budget) = apply_sku_budget(&frame, &self.config);
        let scale = MagnitudeScale::detect(frame.max_abs_quantity());
        if !scale.is_identity() {
            frame.map_quantities(|q| scale.apply(q));
        }
        // Memory-reduction downcast; forecasts inherit f32 round-off.
        frame.map_quantities(downcast_value);

        let candidates = request
            .candidate_features
            .clone()
            .unwrap_or_else(|| frame.aux_names());
        let manager = EncoderManager::fit(&frame, &candidates, &self.config);

        if cancel.is_cancelled() {
            info!(%run_id, "run cancelled after encoder fit");
            return Ok(RunOutcome::Cancelled);
        }

        let horizon_periods = days_to_periods(request.horizon_days, request.granularity);
        let last_date = frame.max_date().expect("frame is non-empty");
        let future_dates = request.granularity.periods_after(last_date, horizon_periods);
        let per_sku = aggregate_frame(&frame, request.granularity);

        let skus = frame.sku_names();
        let parallel = skus.len() > self.config.parallel_threshold;

        let mut packages: Vec<ForecastPackage> = skus
            .iter()
            .map(|sku| {
                let endogenous = per_sku
                    .get(sku)
                    .cloned()
                    .unwrap_or_else(|| Series::new(Vec::new(), Vec::new()));
                let exogenous = manager
                    .transform_for_sku(sku, &frame)
                    .map(|m| aggregate_matrix_mean(&m, request.granularity));
                let future_exogenous = exogenous
                    .as_ref()
                    .and_then(|m| manager.extrapolate(m, &future_dates));
                ForecastPackage {
                    sku: sku.clone(),
                    endogenous,
                    exogenous,
                    future_exogenous,
                    future_dates: future_dates.clone(),
                    horizon_periods,
                    granularity: request.granularity,
                    scale_factor: scale.factor(),
                }
            })
            .collect();

        if !parallel {
            // Small runs share one global exogenous matrix, when any
            // features are admissible for every SKU.
            let global = manager
                .transform_global(&frame)
                .map(|m| aggregate_matrix_mean(&m, request.granularity));
            let global_future = global
                .as_ref()
                .and_then(|m| manager.extrapolate(m, &future_dates));
            for package in &mut packages {
                package.exogenous = global.clone();
                package.future_exogenous = global_future.clone();
            }
        }

        let outcome = if parallel {
            self.run_parallel(&packages, request.strategy, cancel)?
        } else {
            WaveOutcome {
                results: self.run_single(&packages, request.strategy)?,
                cancelled: false,
            }
        };
        if outcome.cancelled {
            info!(%run_id, "run cancelled during fan-out");
            return Ok(RunOutcome::Cancelled);
        }

        let (mut forecasts, mut skipped) = outcome.results;
        // Deterministic column order regardless of completion order.
        forecasts.sort_by(|a, b| a.sku.cmp(&b.sku));
        skipped.sort_by(|a, b| a.sku.cmp(&b.sku));

        let finished_at = Utc::now();
        let diagnostics = RunDiagnostics {
            run_id,
            started_at,
            finished_at,
            elapsed_ms: timer.elapsed().as_millis() as u64,
            granularity: request.granularity,
            horizon_periods,
            input_rows,
            input_skus,
            row_budget,
            sku_budget,
            scale_factor: scale.factor(),
            parallel,
            forecasted_skus: forecasts.len(),
            skipped_skus: skipped.clone(),
            feature_rejections: manager.rejections().to_vec(),
        };

        let bundle = ForecastBundle {
            run_id,
            created_at: finished_at,
            granularity: request.granularity,
            horizon_periods,
            date_format: frame.date_format(),
            dates: future_dates,
            forecasts,
            skipped,
        };

        info!(
            %run_id,
            forecasted = bundle.forecasts.len(),
            skipped = bundle.skipped.len(),
            elapsed_ms = diagnostics.elapsed_ms,
            "forecast run complete"
        );

        Ok(RunOutcome::Completed {
            bundle,
            diagnostics,
        })
    }

    /// Parallel path: waves of pool-size tasks on a bounded work-stealing
    /// pool. Worker failures become skip entries; peers are unaffected.
    fn run_parallel(
        &self,
        packages: &[ForecastPackage],
        strategy: StrategyKind,
        cancel: &CancellationFlag,
    ) -> ForecastResult<WaveOutcome> {
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| ForecastError::InternalError(format!("thread pool: {}", e)))?;

        let mut forecasts = Vec::new();
        let mut skipped = Vec::new();

        for wave in packages.chunks(workers) {
            // Observed between waves: stop submitting, let in-flight drain.
            if cancel.is_cancelled() {
                return Ok(WaveOutcome {
                    results: (forecasts, skipped),
                    cancelled: true,
                });
            }

            let wave_results: Vec<(String, Result<SkuForecast, WorkerError>)> = pool.install(|| {
                wave.par_iter()
                    .map(|package| {
                        (
                            package.sku.clone(),
                            forecast_package(package, strategy, &self.config),
                        )
                    })
                    .collect()
            });

            for (sku, result) in wave_results {
                match result {
                    Ok(forecast) => forecasts.push(forecast),
                    Err(err) => {
                        let reason = err.reason();
                        warn!(sku = %sku, %reason, "SKU skipped");
                        skipped.push(SkippedSku { sku, reason });
                    }
                }
            }
        }

        Ok(WaveOutcome {
            results: (forecasts, skipped),
            cancelled: false,
        })
    }

    /// Single-model path for small SKU counts: sequential over the wide
    /// pivot, sharing one strategy configuration. A fit failure fails the
    /// whole run.
    fn run_single(
        &self,
        packages: &[ForecastPackage],
        strategy: StrategyKind,
    ) -> ForecastResult<(Vec<SkuForecast>, Vec<SkippedSku>)> {
        let mut forecasts = Vec::new();
        let mut skipped = Vec::new();

        for package in packages {
            match forecast_package(package, strategy, &self.config) {
                Ok(forecast) => forecasts.push(forecast),
                Err(WorkerError::Skipped(reason)) => {
                    warn!(sku = %package.sku, %reason, "SKU skipped");
                    skipped.push(SkippedSku {
                        sku: package.sku.clone(),
                        reason,
                    });
                }
                Err(WorkerError::Failed(err)) => return Err(err),
            }
        }

        Ok((forecasts, skipped))
    }
}

struct WaveOutcome {
    results: (Vec<SkuForecast>, Vec<SkippedSku>),
    cancelled: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::DateFormat;

    fn frame(skus: usize, days: u32, quantity: impl Fn(usize, u32) -> f64) -> CleanFrame {
        let mut dates = Vec::new();
        let mut names = Vec::new();
        let mut quantities = Vec::new();
        for s in 0..skus {
            for d in 0..days {
                dates.push(
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(d as i64),
                );
                names.push(format!("SKU-{:03}", s));
                quantities.push(quantity(s, d));
            }
        }
        CleanFrame::from_columns(dates, names, quantities, BTreeMap::new(), DateFormat::Iso)
            .unwrap()
    }

    fn completed(outcome: RunOutcome) -> (ForecastBundle, RunDiagnostics) {
        match outcome {
            RunOutcome::Completed {
                bundle,
                diagnostics,
            } => (bundle, diagnostics),
            RunOutcome::Cancelled => panic!("run was cancelled"),
        }
    }

    #[test]
    fn test_single_path_for_small_sku_count() {
        let frame = frame(3, 30, |_, _| 50.0);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(7, Granularity::Daily);

        let (bundle, diagnostics) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        assert!(!diagnostics.parallel);
        assert_eq!(bundle.forecasts.len(), 3);
        assert_eq!(bundle.dates.len(), 7);
    }

    #[test]
    fn test_parallel_path_above_threshold() {
        let frame = frame(12, 30, |s, d| 10.0 + s as f64 + (d % 5) as f64);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(5, Granularity::Daily);

        let (bundle, diagnostics) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        assert!(diagnostics.parallel);
        assert_eq!(bundle.forecasts.len(), 12);
    }

    #[test]
    fn test_columns_sorted_lexicographically() {
        let frame = frame(12, 20, |_, _| 5.0);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(3, Granularity::Daily);

        let (bundle, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        let names = bundle.sku_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_zero_sku_recorded_in_skipped_map() {
        let frame = frame(3, 30, |s, _| if s == 1 { 0.0 } else { 20.0 });
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(7, Granularity::Daily);

        let (bundle, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        assert_eq!(bundle.forecasts.len(), 2);
        assert_eq!(bundle.skipped.len(), 1);
        assert_eq!(bundle.skipped[0].sku, "SKU-001");
        assert!(bundle.skipped[0].reason.contains("zeros"));
    }

    #[test]
    fn test_cancelled_before_start() {
        let frame = frame(2, 30, |_, _| 5.0);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let outcome = dispatcher
            .run(&frame, &RunRequest::new(7, Granularity::Daily), &cancel)
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled));
    }

    #[test]
    fn test_future_dates_after_history() {
        let frame = frame(2, 30, |_, _| 5.0);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(14, Granularity::Daily);

        let (bundle, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        let last_history = frame.max_date().unwrap();
        assert!(bundle.dates.iter().all(|d| *d > last_history));
        assert_eq!(bundle.dates.len(), 14);
    }

    #[test]
    fn test_weekly_horizon_conversion() {
        let frame = frame(2, 120, |_, d| 10.0 + (d % 7) as f64);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(30, Granularity::Weekly);

        let (bundle, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        // 30 days at weekly granularity is 4 periods.
        assert_eq!(bundle.horizon_periods, 4);
        assert_eq!(bundle.dates.len(), 4);
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let frame = frame(1, 20, |_, _| 5.0);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        assert!(dispatcher
            .run(
                &frame,
                &RunRequest::new(0, Granularity::Daily),
                &CancellationFlag::new()
            )
            .is_err());
    }

    #[test]
    fn test_determinism_across_runs() {
        let frame = frame(12, 40, |s, d| 20.0 + (s * 3) as f64 + (d % 6) as f64);
        let dispatcher = ForecastDispatcher::new(EngineConfig::default());
        let request = RunRequest::new(7, Granularity::Daily);

        let (first, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        let (second, _) = completed(
            dispatcher
                .run(&frame, &request, &CancellationFlag::new())
                .unwrap(),
        );
        assert_eq!(first.forecasts, second.forecasts);
        assert_eq!(first.dates, second.dates);
    }
}
