// Typed columnar table for cleaned inventory history

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{date_format::DateFormat, error::Result, StockSightError};

/// One cell of an auxiliary column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuxValue {
    Text(String),
    Number(f64),
    Null,
}

impl AuxValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AuxValue::Null)
    }

    /// The categorical label for this cell, if it has one.
    pub fn label(&self) -> Option<String> {
        match self {
            AuxValue::Text(s) => Some(s.clone()),
            AuxValue::Number(n) => Some(n.to_string()),
            AuxValue::Null => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AuxValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A named auxiliary column, aligned to the frame's row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxColumn {
    pub values: Vec<AuxValue>,
}

impl AuxColumn {
    pub fn new(values: Vec<AuxValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_null()).count()
    }
}

/// The canonical cleaned history: one row per `(date, sku)` observation.
///
/// Invariants: rows are sorted by `(date, sku)`, the `(date, sku)` pairs are
/// unique, and quantities are non-negative. Construction through
/// [`CleanFrame::from_columns`] enforces all three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanFrame {
    dates: Vec<NaiveDate>,
    skus: Vec<String>,
    quantities: Vec<f64>,
    aux: BTreeMap<String, AuxColumn>,
    date_format: DateFormat,
}

impl CleanFrame {
    /// Build a frame from parallel columns, sorting rows by `(date, sku)`.
    ///
    /// Fails if column lengths disagree, a `(date, sku)` pair repeats, or a
    /// quantity is negative or non-finite.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        skus: Vec<String>,
        quantities: Vec<f64>,
        aux: BTreeMap<String, AuxColumn>,
        date_format: DateFormat,
    ) -> Result<Self> {
        let n = dates.len();
        if skus.len() != n || quantities.len() != n {
            return Err(StockSightError::invalid_frame(format!(
                "column length mismatch: dates={}, skus={}, quantities={}",
                n,
                skus.len(),
                quantities.len()
            )));
        }
        for (name, column) in &aux {
            if column.len() != n {
                return Err(StockSightError::invalid_frame(format!(
                    "auxiliary column '{}' has {} values, expected {}",
                    name,
                    column.len(),
                    n
                )));
            }
        }
        if let Some(q) = quantities.iter().find(|q| !q.is_finite() || **q < 0.0) {
            return Err(StockSightError::invalid_frame(format!(
                "quantity {} is negative or non-finite",
                q
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| (dates[a], &skus[a]).cmp(&(dates[b], &skus[b])));

        let mut frame = Self {
            dates: order.iter().map(|&i| dates[i]).collect(),
            skus: order.iter().map(|&i| skus[i].clone()).collect(),
            quantities: order.iter().map(|&i| quantities[i]).collect(),
            aux: BTreeMap::new(),
            date_format,
        };
        for (name, column) in aux {
            let values = order.iter().map(|&i| column.values[i].clone()).collect();
            frame.aux.insert(name, AuxColumn::new(values));
        }

        for window in frame.row_keys().windows(2) {
            if window[0] == window[1] {
                return Err(StockSightError::invalid_frame(format!(
                    "duplicate (date, sku) pair: ({}, {})",
                    window[0].0, window[0].1
                )));
            }
        }

        Ok(frame)
    }

    fn row_keys(&self) -> Vec<(NaiveDate, &str)> {
        self.dates
            .iter()
            .zip(self.skus.iter())
            .map(|(d, s)| (*d, s.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn skus(&self) -> &[String] {
        &self.skus
    }

    pub fn quantities(&self) -> &[f64] {
        &self.quantities
    }

    pub fn aux(&self) -> &BTreeMap<String, AuxColumn> {
        &self.aux
    }

    pub fn aux_column(&self, name: &str) -> Option<&AuxColumn> {
        self.aux.get(name)
    }

    pub fn aux_names(&self) -> Vec<String> {
        self.aux.keys().cloned().collect()
    }

    pub fn date_format(&self) -> DateFormat {
        self.date_format
    }

    /// Distinct SKU names in lexicographic order.
    pub fn sku_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skus.clone();
        names.sort();
        names.dedup();
        names
    }

    pub fn sku_count(&self) -> usize {
        self.sku_names().len()
    }

    /// Row indices belonging to one SKU, in date order.
    pub fn rows_for_sku(&self, sku: &str) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.skus[i] == sku).collect()
    }

    /// The `(date, quantity)` series for one SKU, in date order.
    pub fn series_for_sku(&self, sku: &str) -> Vec<(NaiveDate, f64)> {
        self.rows_for_sku(sku)
            .into_iter()
            .map(|i| (self.dates[i], self.quantities[i]))
            .collect()
    }

    pub fn min_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Largest absolute quantity, used for magnitude scaling.
    pub fn max_abs_quantity(&self) -> f64 {
        self.quantities.iter().fold(0.0f64, |m, q| m.max(q.abs()))
    }

    /// Total quantity per SKU, used for top-K truncation.
    pub fn total_quantity_by_sku(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for i in 0..self.len() {
            *totals.entry(self.skus[i].clone()).or_insert(0.0) += self.quantities[i];
        }
        totals
    }

    /// Apply a transform to every quantity in place.
    pub fn map_quantities(&mut self, f: impl Fn(f64) -> f64) {
        for q in &mut self.quantities {
            *q = f(*q);
        }
    }

    /// A new frame containing only the given row indices.
    ///
    /// Indices must be sorted; row order (and thus the sort invariant) is
    /// preserved.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut aux = BTreeMap::new();
        for (name, column) in &self.aux {
            let values = indices.iter().map(|&i| column.values[i].clone()).collect();
            aux.insert(name.clone(), AuxColumn::new(values));
        }
        Self {
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
            skus: indices.iter().map(|&i| self.skus[i].clone()).collect(),
            quantities: indices.iter().map(|&i| self.quantities[i]).collect(),
            aux,
            date_format: self.date_format,
        }
    }

    /// A new frame containing only rows of the given SKUs.
    pub fn select_skus(&self, keep: &[String]) -> Self {
        let indices: Vec<usize> = (0..self.len())
            .filter(|&i| keep.contains(&self.skus[i]))
            .collect();
        self.select_rows(&indices)
    }
}
