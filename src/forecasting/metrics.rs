// Forecast accuracy metrics on a holdout window

use serde::{Deserialize, Serialize};

use super::{ForecastError, ForecastResult};

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,

    /// Root Mean Square Error
    pub rmse: f64,

    /// Mean Absolute Percentage Error
    pub mape: f64,

    /// Number of holdout points compared
    pub n: usize,
}

impl ForecastMetrics {
    pub fn new(actual: &[f64], predicted: &[f64]) -> ForecastResult<Self> {
        Ok(Self {
            mae: calculate_mae(actual, predicted)?,
            rmse: calculate_rmse(actual, predicted)?,
            mape: calculate_mape(actual, predicted)?,
            n: actual.len(),
        })
    }
}

fn check_lengths(actual: &[f64], predicted: &[f64]) -> ForecastResult<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::CalculationError(
            "Actual and predicted arrays must have the same length".to_string(),
        ));
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData(
            "Cannot calculate metrics with empty arrays".to_string(),
        ));
    }
    Ok(())
}

/// Calculate Mean Absolute Error
pub fn calculate_mae(actual: &[f64], predicted: &[f64]) -> ForecastResult<f64> {
    check_lengths(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculate Root Mean Square Error
pub fn calculate_rmse(actual: &[f64], predicted: &[f64]) -> ForecastResult<f64> {
    check_lengths(actual, predicted)?;
    let sum_squared: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok((sum_squared / actual.len() as f64).sqrt())
}

/// Calculate Mean Absolute Percentage Error, skipping zero actuals.
pub fn calculate_mape(actual: &[f64], predicted: &[f64]) -> ForecastResult<f64> {
    check_lengths(actual, predicted)?;

    let mut sum_percentage = 0.0;
    let mut valid = 0;
    for (a, p) in actual.iter().zip(predicted) {
        if a.abs() > f64::EPSILON {
            sum_percentage += ((a - p) / a).abs() * 100.0;
            valid += 1;
        }
    }

    if valid == 0 {
        return Ok(0.0);
    }
    Ok(sum_percentage / valid as f64)
}
