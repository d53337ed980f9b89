// Data-size budgets: row sampling and SKU top-K truncation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EngineConfig;
use crate::domain::CleanFrame;

/// What a budget pass did to the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BudgetAction {
    SampledRows {
        from: usize,
        to: usize,
        keep_recent: bool,
    },
    TruncatedSkus {
        from: usize,
        to: usize,
    },
}

/// Downsample the frame to `sample_rows` when it exceeds `max_rows`.
///
/// With `keep_recent` the most recent rows in date order are kept; otherwise
/// a uniform sample is drawn with the configured seed so repeated runs agree.
pub fn apply_row_budget(
    frame: &CleanFrame,
    config: &EngineConfig,
) -> (CleanFrame, Option<BudgetAction>) {
    let n = frame.len();
    if n <= config.max_rows {
        return (frame.clone(), None);
    }

    let keep = config.sample_rows.min(n);
    let mut indices: Vec<usize> = if config.keep_recent {
        // Rows are sorted by (date, sku); the suffix is the most recent.
        (n - keep..n).collect()
    } else {
        let mut rng = StdRng::seed_from_u64(config.sample_seed);
        let mut all: Vec<usize> = (0..n).collect();
        all.shuffle(&mut rng);
        all.truncate(keep);
        all
    };
    indices.sort_unstable();

    let action = BudgetAction::SampledRows {
        from: n,
        to: keep,
        keep_recent: config.keep_recent,
    };
    info!(from = n, to = keep, keep_recent = config.keep_recent, "row budget engaged");
    (frame.select_rows(&indices), Some(action))
}

/// Keep only the top-K SKUs by total quantity when the distinct count
/// exceeds `max_skus`.
pub fn apply_sku_budget(
    frame: &CleanFrame,
    config: &EngineConfig,
) -> (CleanFrame, Option<BudgetAction>) {
    let totals = frame.total_quantity_by_sku();
    if totals.len() <= config.max_skus {
        return (frame.clone(), None);
    }

    let mut ranked: Vec<(&String, &f64)> = totals.iter().collect();
    // Total descending, SKU ascending for ties, so truncation is stable.
    ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));
    let keep: Vec<String> = ranked
        .into_iter()
        .take(config.max_skus)
        .map(|(sku, _)| sku.clone())
        .collect();

    let action = BudgetAction::TruncatedSkus {
        from: totals.len(),
        to: keep.len(),
    };
    info!(from = totals.len(), to = keep.len(), "sku budget engaged");
    (frame.select_skus(&keep), Some(action))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::DateFormat;

    fn frame(rows: Vec<(u32, &str, f64)>) -> CleanFrame {
        let dates = rows
            .iter()
            .map(|(d, _, _)| NaiveDate::from_ymd_opt(2024, 1, *d).unwrap())
            .collect();
        let skus = rows.iter().map(|(_, s, _)| s.to_string()).collect();
        let quantities = rows.iter().map(|(_, _, q)| *q).collect();
        CleanFrame::from_columns(dates, skus, quantities, BTreeMap::new(), DateFormat::Iso)
            .unwrap()
    }

    fn config(max_rows: usize, sample_rows: usize, keep_recent: bool) -> EngineConfig {
        EngineConfig {
            max_rows,
            sample_rows,
            keep_recent,
            ..Default::default()
        }
    }

    #[test]
    fn test_row_budget_noop_under_limit() {
        let frame = frame(vec![(1, "A", 1.0), (2, "A", 2.0)]);
        let (out, action) = apply_row_budget(&frame, &config(10, 5, true));
        assert_eq!(out.len(), 2);
        assert_eq!(action, None);
    }

    #[test]
    fn test_row_budget_keeps_recent() {
        let frame = frame(vec![
            (1, "A", 1.0),
            (2, "A", 2.0),
            (3, "A", 3.0),
            (4, "A", 4.0),
        ]);
        let (out, action) = apply_row_budget(&frame, &config(3, 2, true));
        assert_eq!(out.len(), 2);
        assert_eq!(out.quantities(), &[3.0, 4.0]);
        assert_eq!(
            action,
            Some(BudgetAction::SampledRows {
                from: 4,
                to: 2,
                keep_recent: true
            })
        );
    }

    #[test]
    fn test_row_budget_uniform_sample_is_deterministic() {
        let frame = frame((1..=20).map(|d| (d, "A", d as f64)).collect());
        let cfg = config(10, 5, false);
        let (first, _) = apply_row_budget(&frame, &cfg);
        let (second, _) = apply_row_budget(&frame, &cfg);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_sku_budget_keeps_top_sellers() {
        let frame = frame(vec![
            (1, "A", 100.0),
            (2, "A", 100.0),
            (1, "B", 1.0),
            (1, "C", 50.0),
        ]);
        let cfg = EngineConfig {
            max_skus: 2,
            ..Default::default()
        };
        let (out, action) = apply_sku_budget(&frame, &cfg);
        assert_eq!(out.sku_names(), vec!["A".to_string(), "C".to_string()]);
        assert_eq!(action, Some(BudgetAction::TruncatedSkus { from: 3, to: 2 }));
    }

    #[test]
    fn test_sku_budget_noop_under_limit() {
        let frame = frame(vec![(1, "A", 1.0), (1, "B", 2.0)]);
        let (out, action) = apply_sku_budget(&frame, &EngineConfig::default());
        assert_eq!(out.sku_count(), 2);
        assert_eq!(action, None);
    }
}
