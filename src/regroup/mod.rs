// Temporal regrouping of histories and forecast bundles

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::CleanFrame;
use crate::features::ExogenousMatrix;
use crate::forecasting::{
    ForecastBundle, ForecastError, ForecastResult, Granularity, Series, SkuForecast,
};

/// Sum each SKU's quantities into periods of the granularity.
///
/// The returned series are keyed by SKU and indexed by period start.
pub fn aggregate_frame(
    frame: &CleanFrame,
    granularity: Granularity,
) -> BTreeMap<String, Series> {
    let mut sums: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for i in 0..frame.len() {
        let period = granularity.period_start(frame.dates()[i]);
        *sums
            .entry(frame.skus()[i].clone())
            .or_default()
            .entry(period)
            .or_insert(0.0) += frame.quantities()[i];
    }

    sums.into_iter()
        .map(|(sku, periods)| {
            let (dates, values): (Vec<NaiveDate>, Vec<f64>) = periods.into_iter().unzip();
            (sku, Series::new(dates, values))
        })
        .collect()
}

/// Mean-aggregate encoded feature rows into periods of the granularity.
pub fn aggregate_matrix_mean(
    matrix: &ExogenousMatrix,
    granularity: Granularity,
) -> ExogenousMatrix {
    let mut groups: BTreeMap<NaiveDate, (Vec<f64>, usize)> = BTreeMap::new();
    for (date, row) in matrix.dates.iter().zip(&matrix.values) {
        let period = granularity.period_start(*date);
        groups
            .entry(period)
            .and_modify(|(acc, count)| {
                for (a, v) in acc.iter_mut().zip(row) {
                    *a += v;
                }
                *count += 1;
            })
            .or_insert((row.clone(), 1));
    }

    let mut dates = Vec::with_capacity(groups.len());
    let mut values = Vec::with_capacity(groups.len());
    for (date, (sums, count)) in groups {
        dates.push(date);
        values.push(sums.into_iter().map(|s| s / count as f64).collect());
    }

    ExogenousMatrix {
        dates,
        columns: matrix.columns.clone(),
        values,
    }
}

/// Re-aggregate a bundle to a coarser (or equal) granularity.
///
/// Point forecasts sum within each period; upper and lower bounds sum
/// separately, so the period error margin stays `(upper − lower) / 2`.
/// Regrouping at the bundle's own granularity is the identity.
pub fn regroup_bundle(
    bundle: &ForecastBundle,
    granularity: Granularity,
) -> ForecastResult<ForecastBundle> {
    if granularity.period_days() < bundle.granularity.period_days() {
        return Err(ForecastError::InvalidConfig(format!(
            "cannot regroup {} bundle to finer {} periods",
            bundle.granularity, granularity
        )));
    }

    // Map every bundle date to its period, preserving order.
    let mut period_dates: Vec<NaiveDate> = bundle
        .dates
        .iter()
        .map(|d| granularity.period_start(*d))
        .collect();
    let mut unique_periods = period_dates.clone();
    unique_periods.dedup();

    let forecasts = bundle
        .forecasts
        .iter()
        .map(|f| regroup_forecast(f, &period_dates, &unique_periods))
        .collect();

    period_dates.dedup();
    Ok(ForecastBundle {
        run_id: bundle.run_id,
        created_at: bundle.created_at,
        granularity,
        horizon_periods: period_dates.len(),
        date_format: bundle.date_format,
        dates: period_dates,
        forecasts,
        skipped: bundle.skipped.clone(),
    })
}

fn regroup_forecast(
    forecast: &SkuForecast,
    period_of_date: &[NaiveDate],
    periods: &[NaiveDate],
) -> SkuForecast {
    let mut point = vec![0.0; periods.len()];
    let mut upper = vec![0.0; periods.len()];
    let mut lower = vec![0.0; periods.len()];

    for (i, period) in period_of_date.iter().enumerate() {
        let slot = periods
            .iter()
            .position(|p| p == period)
            .expect("period derived from bundle dates");
        point[slot] += forecast.point[i];
        upper[slot] += forecast.upper[i];
        lower[slot] += forecast.lower[i];
    }

    SkuForecast {
        sku: forecast.sku.clone(),
        dates: periods.to_vec(),
        point,
        upper,
        lower,
        metadata: forecast.metadata.clone(),
    }
}
