// Forecasting data types: granularity, series, packages, bundles

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DateFormat;
use crate::features::ExogenousMatrix;

use super::metrics::ForecastMetrics;

/// The time-period size histories are aggregated to before forecasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Granularity {
    /// Nominal days per period, used for horizon conversion.
    pub const fn period_days(&self) -> u32 {
        match self {
            Granularity::Daily => 1,
            Granularity::Weekly => 7,
            Granularity::Monthly => 30,
            Granularity::Quarterly => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
            Granularity::Quarterly => "Quarterly",
        }
    }

    /// The first day of the period containing `date`. Weeks start Monday.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Monthly => date.with_day(1).expect("first of month is valid"),
            Granularity::Quarterly => {
                let quarter_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), quarter_month, 1)
                    .expect("first of quarter is valid")
            }
        }
    }

    /// The start of the period after the one beginning at `start`.
    pub fn next_period(&self, start: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => start + Duration::days(1),
            Granularity::Weekly => start + Duration::days(7),
            Granularity::Monthly => add_months(start, 1),
            Granularity::Quarterly => add_months(start, 3),
        }
    }

    /// The first `count` period starts strictly after the period of `last`.
    pub fn periods_after(&self, last: NaiveDate, count: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(count);
        let mut current = self.period_start(last);
        for _ in 0..count {
            current = self.next_period(current);
            dates.push(current);
        }
        dates
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is valid")
}

/// Convert a horizon in days to whole periods of the granularity.
pub fn days_to_periods(days: u32, granularity: Granularity) -> usize {
    ((days / granularity.period_days()) as usize).max(1)
}

/// A date-indexed sequence of quantities for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum() / self.len() as f64)
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.len() - 1) as f64;
        Some(variance.sqrt())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The prefix of the series covering the first `n` observations.
    pub fn head(&self, n: usize) -> Series {
        Series {
            dates: self.dates[..n].to_vec(),
            values: self.values[..n].to_vec(),
        }
    }

    /// The suffix of the series after the first `n` observations.
    pub fn tail_from(&self, n: usize) -> Series {
        Series {
            dates: self.dates[n..].to_vec(),
            values: self.values[n..].to_vec(),
        }
    }

    /// Keep only observations whose date appears in `keep`, preserving order.
    pub fn restrict_to_dates(&self, keep: &[NaiveDate]) -> Series {
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (date, value) in self.dates.iter().zip(&self.values) {
            if keep.contains(date) {
                dates.push(*date);
                values.push(*value);
            }
        }
        Series { dates, values }
    }
}

/// Cooperative cancellation handle shared between the coordinator and the
/// dispatcher. Setting it stops new work; in-flight workers drain.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.inner.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Everything one worker needs to forecast one SKU.
#[derive(Debug, Clone)]
pub struct ForecastPackage {
    pub sku: String,
    /// The SKU's quantity series, aggregated to the run granularity.
    pub endogenous: Series,
    /// Date-aligned encoded features, if the SKU has any admissible ones.
    pub exogenous: Option<ExogenousMatrix>,
    /// Encoded features extrapolated over the horizon.
    pub future_exogenous: Option<ExogenousMatrix>,
    pub future_dates: Vec<NaiveDate>,
    pub horizon_periods: usize,
    pub granularity: Granularity,
    /// Magnitude factor the quantities were divided by; outputs are
    /// multiplied back.
    pub scale_factor: f64,
}

/// Per-SKU metadata attached to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuForecastMeta {
    pub data_points_used: usize,
    pub feature_count: usize,
    pub seasonality_detected: bool,
    pub seasonal_period: Option<usize>,
    pub model_name: String,
    pub metrics: Option<ForecastMetrics>,
}

/// Point forecast and prediction-interval bounds for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuForecast {
    pub sku: String,
    pub dates: Vec<NaiveDate>,
    pub point: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub metadata: SkuForecastMeta,
}

impl SkuForecast {
    /// Half the bound spread per period.
    pub fn error_margins(&self) -> Vec<f64> {
        self.upper
            .iter()
            .zip(&self.lower)
            .map(|(u, l)| (u - l) / 2.0)
            .collect()
    }
}

/// One SKU the run could not forecast, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSku {
    pub sku: String,
    pub reason: String,
}

/// The aggregate result of one forecast run.
///
/// Columns are sorted lexicographically by SKU and all share `dates`, so the
/// bundle reads as a date × SKU matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub granularity: Granularity,
    pub horizon_periods: usize,
    pub date_format: DateFormat,
    pub dates: Vec<NaiveDate>,
    pub forecasts: Vec<SkuForecast>,
    pub skipped: Vec<SkippedSku>,
}

impl ForecastBundle {
    pub fn sku_names(&self) -> Vec<String> {
        self.forecasts.iter().map(|f| f.sku.clone()).collect()
    }

    pub fn get(&self, sku: &str) -> Option<&SkuForecast> {
        self.forecasts.iter().find(|f| f.sku == sku)
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }
}
