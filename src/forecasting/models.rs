// In-tree forecast strategies

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::ExogenousMatrix;

use super::strategy::{
    season_length, z_score, FitOptions, FitSummary, ForecastStrategy, PredictionBands,
};
use super::types::{Granularity, Series};
use super::{ForecastError, ForecastResult};

const BOOTSTRAP_DRAWS: usize = 500;
const RIDGE: f64 = 1e-8;

/// Seasonal-naïve baseline with residual-bootstrap intervals.
///
/// The point forecast repeats the last observed cycle; when the series is
/// too short for a full cycle it degrades to last-value naïve. In-sample
/// residuals feed both the bootstrap bounds and, when an exogenous matrix is
/// supplied, a small least-squares adjustment on the encoded features.
pub struct SeasonalNaiveStrategy {
    season: usize,
    base_point: Vec<f64>,
    lower_offsets: Vec<f64>,
    upper_offsets: Vec<f64>,
    exog_coefs: Option<Vec<f64>>,
    trained: bool,
}

impl SeasonalNaiveStrategy {
    pub fn new() -> Self {
        Self {
            season: 1,
            base_point: Vec::new(),
            lower_offsets: Vec::new(),
            upper_offsets: Vec::new(),
            exog_coefs: None,
            trained: false,
        }
    }
}

impl Default for SeasonalNaiveStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastStrategy for SeasonalNaiveStrategy {
    fn name(&self) -> &'static str {
        "Seasonal Naive"
    }

    fn fit(
        &mut self,
        endogenous: &Series,
        exogenous: Option<&ExogenousMatrix>,
        horizon: usize,
        granularity: Granularity,
        options: &FitOptions,
    ) -> ForecastResult<()> {
        let values = &endogenous.values;
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData(
                "Seasonal naive requires at least 2 data points".to_string(),
            ));
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidConfig(
                "Horizon must be at least 1".to_string(),
            ));
        }

        let full_season = season_length(granularity);
        self.season = if values.len() >= 2 * full_season {
            full_season
        } else {
            1
        };

        // Repeat the last observed cycle across the horizon.
        let n = values.len();
        self.base_point = (0..horizon)
            .map(|h| values[n - self.season + (h % self.season)].max(0.0))
            .collect();

        // One-step in-sample residuals of the seasonal walk.
        let residuals: Vec<f64> = (self.season..n)
            .map(|t| values[t] - values[t - self.season])
            .collect();

        self.exog_coefs = exogenous.and_then(|exog| {
            fit_residual_regression(&residuals, exog, self.season)
        });

        let (lower, upper) = bootstrap_offsets(
            &residuals,
            horizon,
            options.prediction_interval,
            options.seed,
        );
        self.lower_offsets = lower;
        self.upper_offsets = upper;
        self.trained = true;

        Ok(())
    }

    fn predict(
        &self,
        future_exogenous: Option<&ExogenousMatrix>,
    ) -> ForecastResult<PredictionBands> {
        if !self.trained {
            return Err(ForecastError::StrategyError(
                "Strategy must be fitted before predicting".to_string(),
            ));
        }

        let mut point = self.base_point.clone();
        if let (Some(coefs), Some(future)) = (&self.exog_coefs, future_exogenous) {
            // coefs = [intercept, per-column slopes].
            if future.ncols() + 1 == coefs.len() {
                for (h, value) in point.iter_mut().enumerate() {
                    if h < future.nrows() {
                        let mut adjustment = coefs[0];
                        for (c, x) in coefs[1..].iter().zip(future.row(h)) {
                            adjustment += c * x;
                        }
                        *value = (*value + adjustment).max(0.0);
                    }
                }
            }
        }

        let upper = point
            .iter()
            .zip(&self.upper_offsets)
            .map(|(p, o)| p + o.max(0.0))
            .collect();
        let lower = point
            .iter()
            .zip(&self.lower_offsets)
            .map(|(p, o)| (p + o.min(0.0)).max(0.0))
            .collect();

        Ok(PredictionBands {
            point,
            upper,
            lower,
        })
    }

    fn fit_summary(&self) -> FitSummary {
        FitSummary {
            model_name: self.name().to_string(),
            seasonality_detected: self.season > 1,
            seasonal_period: (self.season > 1).then_some(self.season),
        }
    }
}

/// Holt-style exponential smoothing with a linear trend component.
///
/// Produces a trend-following forecast with symmetric z-score bounds from
/// the one-step residual spread. Exogenous features are ignored.
pub struct ExponentialSmoothingStrategy {
    alpha: f64,
    beta: f64,
    level: f64,
    trend: f64,
    residual_std: f64,
    horizon: usize,
    margin_z: f64,
    trained: bool,
}

impl ExponentialSmoothingStrategy {
    pub fn new(alpha: f64, beta: f64) -> ForecastResult<Self> {
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return Err(ForecastError::InvalidConfig(
                "Smoothing factors must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self {
            alpha,
            beta,
            level: 0.0,
            trend: 0.0,
            residual_std: 0.0,
            horizon: 0,
            margin_z: 1.96,
            trained: false,
        })
    }

    /// Default smoothing factors: alpha 0.3, beta 0.1.
    pub fn with_defaults() -> Self {
        Self::new(0.3, 0.1).expect("default factors are valid")
    }
}

impl ForecastStrategy for ExponentialSmoothingStrategy {
    fn name(&self) -> &'static str {
        "Exponential Smoothing"
    }

    fn fit(
        &mut self,
        endogenous: &Series,
        _exogenous: Option<&ExogenousMatrix>,
        horizon: usize,
        _granularity: Granularity,
        options: &FitOptions,
    ) -> ForecastResult<()> {
        let values = &endogenous.values;
        if values.is_empty() {
            return Err(ForecastError::InsufficientData(
                "Exponential smoothing requires at least 1 data point".to_string(),
            ));
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidConfig(
                "Horizon must be at least 1".to_string(),
            ));
        }

        let mut level = values[0];
        let mut trend = if values.len() > 1 {
            values[1] - values[0]
        } else {
            0.0
        };

        let mut residuals = Vec::with_capacity(values.len().saturating_sub(1));
        for &value in &values[1..] {
            let predicted = level + trend;
            residuals.push(value - predicted);
            let prior_level = level;
            level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prior_level) + (1.0 - self.beta) * trend;
        }

        self.level = level;
        self.trend = trend;
        self.residual_std = std_dev(&residuals);
        self.horizon = horizon;
        self.margin_z = z_score(options.prediction_interval);
        self.trained = true;

        Ok(())
    }

    fn predict(
        &self,
        _future_exogenous: Option<&ExogenousMatrix>,
    ) -> ForecastResult<PredictionBands> {
        if !self.trained {
            return Err(ForecastError::StrategyError(
                "Strategy must be fitted before predicting".to_string(),
            ));
        }

        let margin = self.margin_z * self.residual_std;
        let mut point = Vec::with_capacity(self.horizon);
        let mut upper = Vec::with_capacity(self.horizon);
        let mut lower = Vec::with_capacity(self.horizon);
        for h in 1..=self.horizon {
            let forecast = (self.level + h as f64 * self.trend).max(0.0);
            point.push(forecast);
            upper.push(forecast + margin);
            lower.push((forecast - margin).max(0.0));
        }

        Ok(PredictionBands {
            point,
            upper,
            lower,
        })
    }

    fn fit_summary(&self) -> FitSummary {
        FitSummary {
            model_name: self.name().to_string(),
            seasonality_detected: false,
            seasonal_period: None,
        }
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Empirical interval offsets from resampled in-sample residuals.
fn bootstrap_offsets(
    residuals: &[f64],
    horizon: usize,
    prediction_interval: f64,
    seed: u64,
) -> (Vec<f64>, Vec<f64>) {
    if residuals.is_empty() {
        return (vec![0.0; horizon], vec![0.0; horizon]);
    }

    let alpha = (1.0 - prediction_interval) / 2.0;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lower = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);

    for _ in 0..horizon {
        let mut draws: Vec<f64> = (0..BOOTSTRAP_DRAWS)
            .map(|_| residuals[rng.gen_range(0..residuals.len())])
            .collect();
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        lower.push(quantile(&draws, alpha));
        upper.push(quantile(&draws, 1.0 - alpha));
    }

    (lower, upper)
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

/// Least squares of seasonal residuals on the aligned exogenous rows, with
/// an intercept and a small ridge term for stability. Returns `None` when
/// the system is degenerate or the shapes disagree.
fn fit_residual_regression(
    residuals: &[f64],
    exog: &ExogenousMatrix,
    season: usize,
) -> Option<Vec<f64>> {
    if residuals.is_empty() || exog.ncols() == 0 {
        return None;
    }
    // Residual t aligns with observation row season + t.
    if exog.nrows() < season + residuals.len() {
        return None;
    }

    let k = exog.ncols() + 1;
    let rows: Vec<Vec<f64>> = residuals
        .iter()
        .enumerate()
        .map(|(t, _)| {
            let mut row = Vec::with_capacity(k);
            row.push(1.0);
            row.extend_from_slice(exog.row(season + t));
            row
        })
        .collect();

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y) in rows.iter().zip(residuals) {
        for i in 0..k {
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
            xty[i] += row[i] * y;
        }
    }
    for (i, diag) in xtx.iter_mut().enumerate() {
        diag[i] += RIDGE * rows.len() as f64;
    }

    solve_linear(xtx, xty)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for col in row + 1..n {
            sum -= a[row][col] * x[col];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn series(values: Vec<f64>) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        Series::new(dates, values)
    }

    fn options() -> FitOptions {
        FitOptions::default()
    }

    #[test]
    fn test_seasonal_naive_repeats_cycle() {
        // Two full weekly cycles.
        let pattern = [10.0, 12.0, 14.0, 16.0, 18.0, 30.0, 40.0];
        let values: Vec<f64> = pattern.iter().chain(pattern.iter()).copied().collect();
        let data = series(values);

        let mut model = SeasonalNaiveStrategy::new();
        model
            .fit(&data, None, 7, Granularity::Daily, &options())
            .unwrap();
        let bands = model.predict(None).unwrap();

        assert_eq!(bands.point, pattern.to_vec());
        let summary = model.fit_summary();
        assert!(summary.seasonality_detected);
        assert_eq!(summary.seasonal_period, Some(7));
    }

    #[test]
    fn test_seasonal_naive_falls_back_to_naive() {
        let data = series(vec![5.0, 6.0, 7.0, 8.0]);
        let mut model = SeasonalNaiveStrategy::new();
        model
            .fit(&data, None, 3, Granularity::Daily, &options())
            .unwrap();
        let bands = model.predict(None).unwrap();

        // Short series: last-value naive.
        assert_eq!(bands.point, vec![8.0, 8.0, 8.0]);
        assert!(!model.fit_summary().seasonality_detected);
    }

    #[test]
    fn test_seasonal_naive_bounds_bracket_point() {
        let values: Vec<f64> = (0..28).map(|i| 100.0 + (i % 7) as f64 * 5.0).collect();
        let data = series(values);
        let mut model = SeasonalNaiveStrategy::new();
        model
            .fit(&data, None, 7, Granularity::Daily, &options())
            .unwrap();
        let bands = model.predict(None).unwrap();

        for i in 0..7 {
            assert!(bands.upper[i] >= bands.point[i]);
            assert!(bands.lower[i] <= bands.point[i]);
            assert!(bands.lower[i] >= 0.0);
        }
    }

    #[test]
    fn test_seasonal_naive_is_deterministic() {
        let values: Vec<f64> = (0..30).map(|i| 50.0 + (i % 7) as f64).collect();
        let data = series(values);

        let mut first = SeasonalNaiveStrategy::new();
        first
            .fit(&data, None, 5, Granularity::Daily, &options())
            .unwrap();
        let mut second = SeasonalNaiveStrategy::new();
        second
            .fit(&data, None, 5, Granularity::Daily, &options())
            .unwrap();

        assert_eq!(first.predict(None).unwrap(), second.predict(None).unwrap());
    }

    #[test]
    fn test_seasonal_naive_requires_data() {
        let mut model = SeasonalNaiveStrategy::new();
        assert!(model
            .fit(&series(vec![1.0]), None, 3, Granularity::Daily, &options())
            .is_err());
        assert!(SeasonalNaiveStrategy::new().predict(None).is_err());
    }

    #[test]
    fn test_exponential_smoothing_follows_trend() {
        let data = series((1..=20).map(|i| i as f64 * 10.0).collect());
        let mut model = ExponentialSmoothingStrategy::with_defaults();
        model
            .fit(&data, None, 5, Granularity::Daily, &options())
            .unwrap();
        let bands = model.predict(None).unwrap();

        assert_eq!(bands.point.len(), 5);
        // Forecast keeps climbing.
        assert!(bands.point.windows(2).all(|w| w[1] > w[0]));
        assert!(bands.point[0] > 150.0);
    }

    #[test]
    fn test_exponential_smoothing_bounds() {
        let data = series(vec![10.0, 12.0, 9.0, 11.0, 10.0, 12.0, 9.0, 11.0]);
        let mut model = ExponentialSmoothingStrategy::with_defaults();
        model
            .fit(&data, None, 4, Granularity::Daily, &options())
            .unwrap();
        let bands = model.predict(None).unwrap();

        for i in 0..4 {
            assert!(bands.upper[i] >= bands.point[i]);
            assert!(bands.lower[i] <= bands.point[i]);
            assert!(bands.lower[i] >= 0.0);
        }
    }

    #[test]
    fn test_exponential_smoothing_invalid_factors() {
        assert!(ExponentialSmoothingStrategy::new(1.5, 0.1).is_err());
        assert!(ExponentialSmoothingStrategy::new(0.3, -0.1).is_err());
        assert!(ExponentialSmoothingStrategy::new(0.3, 0.1).is_ok());
    }

    #[test]
    fn test_exog_adjustment_shifts_forecast() {
        // Flat base series; residuals correlate perfectly with the feature.
        let n = 28;
        let feature: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let values: Vec<f64> = feature.iter().map(|x| 100.0 + 10.0 * x).collect();
        let data = series(values);
        let exog = ExogenousMatrix {
            dates: data.dates.clone(),
            columns: vec!["signal".into()],
            values: feature.iter().map(|x| vec![*x]).collect(),
        };

        let mut model = SeasonalNaiveStrategy::new();
        model
            .fit(&data, Some(&exog), 2, Granularity::Daily, &options())
            .unwrap();

        let high = ExogenousMatrix {
            dates: vec![
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            ],
            columns: vec!["signal".into()],
            values: vec![vec![1.0], vec![1.0]],
        };
        let low = ExogenousMatrix {
            values: vec![vec![-1.0], vec![-1.0]],
            ..high.clone()
        };

        let bands_high = model.predict(Some(&high)).unwrap();
        let bands_low = model.predict(Some(&low)).unwrap();
        assert!(bands_high.point[0] > bands_low.point[0]);
    }

    #[test]
    fn test_solve_linear() {
        // 2x + y = 5, x + 3y = 10.
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![5.0, 10.0];
        let x = solve_linear(a, b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_solve_linear_singular() {
        let a = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let b = vec![2.0, 2.0];
        assert!(solve_linear(a, b).is_none());
    }
}
