// Per-SKU summary statistics used for tiering and reporting

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::frame::CleanFrame;

/// Summary statistics for one SKU's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuSummary {
    pub sku: String,
    pub record_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub total_quantity: f64,
    pub mean_quantity: f64,
    pub std_quantity: f64,
}

impl SkuSummary {
    /// Summaries for every SKU in the frame, in lexicographic SKU order.
    pub fn compute(frame: &CleanFrame) -> Vec<SkuSummary> {
        frame
            .sku_names()
            .into_iter()
            .filter_map(|sku| {
                let series = frame.series_for_sku(&sku);
                let (first, _) = *series.first()?;
                let (last, _) = *series.last()?;
                let values: Vec<f64> = series.iter().map(|(_, q)| *q).collect();
                let total: f64 = values.iter().sum();
                let mean = total / values.len() as f64;
                let std = if values.len() < 2 {
                    0.0
                } else {
                    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                        / (values.len() - 1) as f64;
                    var.sqrt()
                };
                Some(SkuSummary {
                    sku,
                    record_count: values.len(),
                    first_date: first,
                    last_date: last,
                    total_quantity: total,
                    mean_quantity: mean,
                    std_quantity: std,
                })
            })
            .collect()
    }
}
