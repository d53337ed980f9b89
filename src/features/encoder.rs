// Per-column encodings and the per-SKU encoder

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::AuxValue;

/// How one column is turned into a number for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureEncoding {
    /// Label table built from the SKU's observed values; unseen and null
    /// labels fall back to `default`.
    Categorical {
        mapping: BTreeMap<String, i64>,
        default: i64,
    },
    /// Z-normalization against the SKU's observed mean and spread; nulls
    /// encode to the mean.
    Numeric { mean: f64, std: f64 },
    /// Rejected during admission; contributes no matrix column.
    Dropped,
}

impl FeatureEncoding {
    /// Encode one cell, or `None` for dropped columns.
    pub fn encode(&self, value: &AuxValue) -> Option<f64> {
        match self {
            FeatureEncoding::Categorical { mapping, default } => {
                let code = value
                    .label()
                    .and_then(|label| mapping.get(&label).copied())
                    .unwrap_or(*default);
                Some(code as f64)
            }
            FeatureEncoding::Numeric { mean, std } => {
                let raw = value.as_number().unwrap_or(*mean);
                if *std == 0.0 {
                    Some(0.0)
                } else {
                    Some((raw - mean) / std)
                }
            }
            FeatureEncoding::Dropped => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, FeatureEncoding::Dropped)
    }
}

/// The fitted encoder for one SKU: every candidate column with its variant,
/// in candidate order. Distinct SKUs may disagree on both the identity and
/// the order of their active columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuEncoder {
    pub sku: String,
    pub columns: Vec<(String, FeatureEncoding)>,
}

impl SkuEncoder {
    /// Names of the columns that survived admission, in order.
    pub fn feature_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, e)| e.is_active())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.columns.iter().filter(|(_, e)| e.is_active()).count()
    }

    /// Encode one row of auxiliary cells (aligned to `columns`) into the
    /// active feature vector.
    pub fn encode_row(&self, cells: &[&AuxValue]) -> Vec<f64> {
        self.columns
            .iter()
            .zip(cells)
            .filter_map(|((_, encoding), value)| encoding.encode(value))
            .collect()
    }
}

/// A date-indexed matrix of encoded feature values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExogenousMatrix {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    /// Row-major: `values[row][col]`.
    pub values: Vec<Vec<f64>>,
}

impl ExogenousMatrix {
    pub fn nrows(&self) -> usize {
        self.values.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    pub fn last_row(&self) -> Option<&[f64]> {
        self.values.last().map(Vec::as_slice)
    }

    pub fn column_means(&self) -> Vec<f64> {
        if self.values.is_empty() {
            return vec![0.0; self.ncols()];
        }
        let mut means = vec![0.0; self.ncols()];
        for row in &self.values {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= self.values.len() as f64;
        }
        means
    }

    /// Keep only rows whose date appears in `keep`, preserving order.
    pub fn restrict_to_dates(&self, keep: &[NaiveDate]) -> ExogenousMatrix {
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (date, row) in self.dates.iter().zip(&self.values) {
            if keep.contains(date) {
                dates.push(*date);
                values.push(row.clone());
            }
        }
        ExogenousMatrix {
            dates,
            columns: self.columns.clone(),
            values,
        }
    }
}
