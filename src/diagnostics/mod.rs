// Per-run diagnostics: what the guards did and what was skipped

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::FeatureRejection;
use crate::forecasting::{Granularity, SkippedSku};
use crate::prep::BudgetAction;

/// Metadata recorded for one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub granularity: Granularity,
    pub horizon_periods: usize,
    pub input_rows: usize,
    pub input_skus: usize,
    pub row_budget: Option<BudgetAction>,
    pub sku_budget: Option<BudgetAction>,
    pub scale_factor: f64,
    pub parallel: bool,
    pub forecasted_skus: usize,
    pub skipped_skus: Vec<SkippedSku>,
    pub feature_rejections: Vec<FeatureRejection>,
}

impl RunDiagnostics {
    /// Rejected features grouped by column, for the post-run report.
    pub fn rejections_by_column(&self) -> BTreeMap<String, Vec<&FeatureRejection>> {
        let mut grouped: BTreeMap<String, Vec<&FeatureRejection>> = BTreeMap::new();
        for rejection in &self.feature_rejections {
            grouped
                .entry(rejection.column.clone())
                .or_default()
                .push(rejection);
        }
        grouped
    }

    /// Human-readable summary of per-SKU feature rejections.
    pub fn feature_rejection_summary(&self) -> String {
        if self.feature_rejections.is_empty() {
            return "All candidate features were admissible.".to_string();
        }

        let mut lines = Vec::new();
        for (column, rejections) in self.rejections_by_column() {
            lines.push(format!(
                "{}: rejected for {} SKU(s)",
                column,
                rejections.len()
            ));
            for r in rejections {
                lines.push(format!("  {} - {}", r.sku, r.reason));
            }
        }
        lines.join("\n")
    }
}
