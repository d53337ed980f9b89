// Column-type classification and admission thresholds

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::AuxValue;

/// Maximum distinct values for numeric storage to count as categorical.
const CATEGORICAL_UNIQUE_LIMIT: usize = 20;

/// Maximum unique-to-observed ratio for numeric storage to count as categorical.
const CATEGORICAL_UNIQUE_RATIO: f64 = 0.5;

/// Minimum unique-to-observed ratio for a categorical feature to carry signal.
const MIN_CATEGORICAL_UNIQUE_RATIO: f64 = 0.01;

/// What a column's non-null values look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Empty,
    Categorical,
    Numeric,
}

/// Classify a column from its values; nulls are stripped first.
///
/// String storage is always categorical. Numeric storage is categorical when
/// it takes few distinct values relative to the observations, numeric
/// otherwise.
pub fn classify(values: &[&AuxValue]) -> ColumnKind {
    let observed: Vec<&AuxValue> = values.iter().copied().filter(|v| !v.is_null()).collect();
    if observed.is_empty() {
        return ColumnKind::Empty;
    }

    if observed.iter().any(|v| matches!(v, AuxValue::Text(_))) {
        return ColumnKind::Categorical;
    }

    let unique: BTreeSet<u64> = observed
        .iter()
        .filter_map(|v| v.as_number())
        .map(f64::to_bits)
        .collect();
    let ratio = unique.len() as f64 / observed.len() as f64;
    if unique.len() < CATEGORICAL_UNIQUE_LIMIT && ratio < CATEGORICAL_UNIQUE_RATIO {
        ColumnKind::Categorical
    } else {
        ColumnKind::Numeric
    }
}

/// Non-null share of a column.
pub fn coverage(values: &[&AuxValue]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let non_null = values.iter().filter(|v| !v.is_null()).count();
    non_null as f64 / values.len() as f64
}

/// Sample mean and standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    (mean, variance.sqrt())
}

/// Numeric admission: squared coefficient of variation at or above the
/// configured floor. A zero-mean column with spread still passes.
pub fn numeric_variance_ok(mean: f64, std: f64, min_variance: f64) -> bool {
    if std == 0.0 {
        return false;
    }
    if mean == 0.0 {
        return true;
    }
    (std / mean).powi(2) >= min_variance
}

/// Categorical admission: at least two labels, and enough distinct labels
/// relative to observations. Constant columns never pass.
pub fn categorical_variance_ok(labels: &[String]) -> bool {
    if labels.is_empty() {
        return false;
    }
    let unique: BTreeSet<&String> = labels.iter().collect();
    unique.len() >= 2 && unique.len() as f64 / labels.len() as f64 >= MIN_CATEGORICAL_UNIQUE_RATIO
}
