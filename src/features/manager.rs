// EncoderManager: fits and owns per-SKU encoders, emits exogenous matrices

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EngineConfig, ExtrapolationPolicy};
use crate::domain::{AuxValue, CleanFrame};

use super::classify::{
    categorical_variance_ok, classify, coverage, mean_std, numeric_variance_ok, ColumnKind,
};
use super::encoder::{ExogenousMatrix, FeatureEncoding, SkuEncoder};

static NULL_CELL: AuxValue = AuxValue::Null;

/// Why a feature was excluded from one SKU's encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Empty,
    LowCoverage { coverage: f64 },
    LowVariance,
    ZeroStd,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Empty => write!(f, "no observed values"),
            RejectionReason::LowCoverage { coverage } => {
                write!(f, "coverage {:.0}% below threshold", coverage * 100.0)
            }
            RejectionReason::LowVariance => write!(f, "variance below threshold"),
            RejectionReason::ZeroStd => write!(f, "constant values"),
        }
    }
}

/// One rejected `(sku, column)` pair, reported after the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRejection {
    pub sku: String,
    pub column: String,
    pub reason: RejectionReason,
}

/// One SKU's active feature columns, as persisted with a saved model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderManifestEntry {
    pub sku: String,
    pub feature_columns: Vec<String>,
}

/// Owns per-SKU encoder state for one forecast run.
///
/// Admission and fitting happen per SKU: two SKUs may end up with disjoint
/// feature sets, and the matrix column order is always SKU-local.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderManager {
    encoders: BTreeMap<String, SkuEncoder>,
    rejections: Vec<FeatureRejection>,
    extrapolation: ExtrapolationPolicy,
}

impl EncoderManager {
    /// Fit one encoder per SKU over the candidate columns.
    pub fn fit(frame: &CleanFrame, candidate_features: &[String], config: &EngineConfig) -> Self {
        let mut encoders = BTreeMap::new();
        let mut rejections = Vec::new();

        for sku in frame.sku_names() {
            let rows = frame.rows_for_sku(&sku);
            let mut columns = Vec::with_capacity(candidate_features.len());

            for name in candidate_features {
                let Some(column) = frame.aux_column(name) else {
                    continue;
                };
                let values: Vec<&AuxValue> = rows.iter().map(|&i| &column.values[i]).collect();

                let (encoding, rejection) = fit_column(&values, config);
                if let Some(reason) = rejection {
                    debug!(sku = %sku, column = %name, %reason, "feature rejected");
                    rejections.push(FeatureRejection {
                        sku: sku.clone(),
                        column: name.clone(),
                        reason,
                    });
                }
                columns.push((name.clone(), encoding));
            }

            encoders.insert(
                sku.clone(),
                SkuEncoder {
                    sku: sku.clone(),
                    columns,
                },
            );
        }

        Self {
            encoders,
            rejections,
            extrapolation: config.extrapolation_policy,
        }
    }

    pub fn encoder_for(&self, sku: &str) -> Option<&SkuEncoder> {
        self.encoders.get(sku)
    }

    pub fn rejections(&self) -> &[FeatureRejection] {
        &self.rejections
    }

    /// Active feature columns per SKU, for model persistence.
    pub fn manifest(&self) -> Vec<EncoderManifestEntry> {
        self.encoders
            .values()
            .map(|encoder| EncoderManifestEntry {
                sku: encoder.sku.clone(),
                feature_columns: encoder.feature_columns(),
            })
            .collect()
    }

    /// The encoded matrix for one SKU, or `None` when no feature survived
    /// admission. Rows sharing a date are aggregated by mean.
    pub fn transform_for_sku(&self, sku: &str, frame: &CleanFrame) -> Option<ExogenousMatrix> {
        let encoder = self.encoders.get(sku)?;
        if encoder.active_count() == 0 {
            return None;
        }

        let rows = frame.rows_for_sku(sku);
        let mut by_date: BTreeMap<NaiveDate, (Vec<f64>, usize)> = BTreeMap::new();
        for i in rows {
            let cells: Vec<&AuxValue> = encoder
                .columns
                .iter()
                .map(|(name, _)| {
                    frame
                        .aux_column(name)
                        .map(|c| &c.values[i])
                        .unwrap_or(&NULL_CELL)
                })
                .collect();
            let encoded = encoder.encode_row(&cells);
            by_date
                .entry(frame.dates()[i])
                .and_modify(|(acc, count)| {
                    for (a, v) in acc.iter_mut().zip(&encoded) {
                        *a += v;
                    }
                    *count += 1;
                })
                .or_insert((encoded, 1));
        }

        let mut dates = Vec::with_capacity(by_date.len());
        let mut values = Vec::with_capacity(by_date.len());
        for (date, (sums, count)) in by_date {
            dates.push(date);
            values.push(sums.into_iter().map(|s| s / count as f64).collect());
        }

        Some(ExogenousMatrix {
            dates,
            columns: encoder.feature_columns(),
            values,
        })
    }

    /// Extrapolate encoded features over the forecast horizon.
    ///
    /// `HoldLast` repeats the last observed encoded row; `Mean` repeats the
    /// column means. Neither requires the caller to supply future covariates.
    pub fn future_exogenous(
        &self,
        sku: &str,
        frame: &CleanFrame,
        future_dates: &[NaiveDate],
    ) -> Option<ExogenousMatrix> {
        let observed = self.transform_for_sku(sku, frame)?;
        self.extrapolate(&observed, future_dates)
    }

    /// Extrapolate an already-encoded observed matrix across future dates
    /// under the configured policy.
    pub fn extrapolate(
        &self,
        observed: &ExogenousMatrix,
        future_dates: &[NaiveDate],
    ) -> Option<ExogenousMatrix> {
        let template = match self.extrapolation {
            ExtrapolationPolicy::HoldLast => observed.last_row()?.to_vec(),
            ExtrapolationPolicy::Mean => observed.column_means(),
        };

        Some(ExogenousMatrix {
            dates: future_dates.to_vec(),
            columns: observed.columns.clone(),
            values: vec![template; future_dates.len()],
        })
    }

    /// Features admissible for every SKU, encoded over the whole frame and
    /// mean-aggregated by date. Used by the single-model path.
    pub fn transform_global(&self, frame: &CleanFrame) -> Option<ExogenousMatrix> {
        let mut encoders = self.encoders.values();
        let first = encoders.next()?;
        let mut shared: Vec<String> = first.feature_columns();
        for encoder in encoders {
            let theirs = encoder.feature_columns();
            shared.retain(|c| theirs.contains(c));
        }
        if shared.is_empty() {
            return None;
        }

        let mut by_date: BTreeMap<NaiveDate, (Vec<f64>, usize)> = BTreeMap::new();
        for i in 0..frame.len() {
            let sku = &frame.skus()[i];
            let Some(encoder) = self.encoders.get(sku) else {
                continue;
            };
            let encoded: Vec<f64> = shared
                .iter()
                .map(|name| {
                    let encoding = encoder
                        .columns
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, e)| e)
                        .unwrap_or(&FeatureEncoding::Dropped);
                    let cell = frame
                        .aux_column(name)
                        .map(|c| &c.values[i])
                        .unwrap_or(&NULL_CELL);
                    encoding.encode(cell).unwrap_or(0.0)
                })
                .collect();
            by_date
                .entry(frame.dates()[i])
                .and_modify(|(acc, count)| {
                    for (a, v) in acc.iter_mut().zip(&encoded) {
                        *a += v;
                    }
                    *count += 1;
                })
                .or_insert((encoded, 1));
        }

        let mut dates = Vec::with_capacity(by_date.len());
        let mut values = Vec::with_capacity(by_date.len());
        for (date, (sums, count)) in by_date {
            dates.push(date);
            values.push(sums.into_iter().map(|s| s / count as f64).collect());
        }

        Some(ExogenousMatrix {
            dates,
            columns: shared,
            values,
        })
    }
}

fn fit_column(
    values: &[&AuxValue],
    config: &EngineConfig,
) -> (FeatureEncoding, Option<RejectionReason>) {
    let cov = coverage(values);
    if cov < config.min_feature_coverage {
        return (
            FeatureEncoding::Dropped,
            Some(RejectionReason::LowCoverage { coverage: cov }),
        );
    }

    match classify(values) {
        ColumnKind::Empty => (FeatureEncoding::Dropped, Some(RejectionReason::Empty)),
        ColumnKind::Categorical => {
            let labels: Vec<String> = values.iter().filter_map(|v| v.label()).collect();
            if !categorical_variance_ok(&labels) {
                return (FeatureEncoding::Dropped, Some(RejectionReason::LowVariance));
            }
            let mut mapping = BTreeMap::new();
            let mut sorted = labels;
            sorted.sort();
            sorted.dedup();
            for (code, label) in sorted.into_iter().enumerate() {
                mapping.insert(label, code as i64);
            }
            (
                FeatureEncoding::Categorical {
                    mapping,
                    default: 0,
                },
                None,
            )
        }
        ColumnKind::Numeric => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
            let (mean, std) = mean_std(&numbers);
            if std == 0.0 {
                return (FeatureEncoding::Dropped, Some(RejectionReason::ZeroStd));
            }
            if !numeric_variance_ok(mean, std, config.min_feature_variance) {
                return (FeatureEncoding::Dropped, Some(RejectionReason::LowVariance));
            }
            (FeatureEncoding::Numeric { mean, std }, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{AuxColumn, DateFormat};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// Two SKUs: A has a usable numeric price and categorical region;
    /// B's price is missing on most rows.
    fn frame_with_features() -> CleanFrame {
        let mut dates = Vec::new();
        let mut skus = Vec::new();
        let mut quantities = Vec::new();
        let mut price = Vec::new();
        let mut region = Vec::new();
        for i in 0..12u32 {
            for sku in ["A", "B"] {
                dates.push(date(i + 1));
                skus.push(sku.to_string());
                quantities.push(10.0 + i as f64);
                if sku == "A" {
                    price.push(AuxValue::Number(5.0 + i as f64));
                    region.push(AuxValue::Text(if i % 2 == 0 { "east" } else { "west" }.into()));
                } else {
                    price.push(AuxValue::Null);
                    region.push(AuxValue::Text("east".into()));
                }
            }
        }
        let mut aux = Map::new();
        aux.insert("Price".to_string(), AuxColumn::new(price));
        aux.insert("Region".to_string(), AuxColumn::new(region));
        CleanFrame::from_columns(dates, skus, quantities, aux, DateFormat::Iso).unwrap()
    }

    fn candidates() -> Vec<String> {
        vec!["Price".to_string(), "Region".to_string()]
    }

    #[test]
    fn test_fit_is_per_sku() {
        let frame = frame_with_features();
        let manager = EncoderManager::fit(&frame, &candidates(), &EngineConfig::default());

        let a = manager.encoder_for("A").unwrap();
        assert_eq!(a.feature_columns(), vec!["Price", "Region"]);

        // B's price fails coverage and its region is constant.
        let b = manager.encoder_for("B").unwrap();
        assert!(b.feature_columns().is_empty());
        assert!(manager
            .rejections()
            .iter()
            .any(|r| r.sku == "B" && r.column == "Price"
                && matches!(r.reason, RejectionReason::LowCoverage { .. })));
        assert!(manager
            .rejections()
            .iter()
            .any(|r| r.sku == "B" && r.column == "Region"
                && r.reason == RejectionReason::LowVariance));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let frame = frame_with_features();
        let config = EngineConfig::default();
        let first = EncoderManager::fit(&frame, &candidates(), &config);
        let second = EncoderManager::fit(&frame, &candidates(), &config);

        for sku in ["A", "B"] {
            assert_eq!(first.encoder_for(sku), second.encoder_for(sku));
        }
    }

    #[test]
    fn test_transform_for_sku() {
        let frame = frame_with_features();
        let manager = EncoderManager::fit(&frame, &candidates(), &EngineConfig::default());

        let matrix = manager.transform_for_sku("A", &frame).unwrap();
        assert_eq!(matrix.ncols(), 2);
        assert_eq!(matrix.nrows(), 12);
        assert_eq!(matrix.columns, vec!["Price", "Region"]);

        assert!(manager.transform_for_sku("B", &frame).is_none());
    }

    #[test]
    fn test_future_exogenous_holds_last_row() {
        let frame = frame_with_features();
        let manager = EncoderManager::fit(&frame, &candidates(), &EngineConfig::default());

        let observed = manager.transform_for_sku("A", &frame).unwrap();
        let future_dates = vec![date(20), date(21), date(22)];
        let future = manager
            .future_exogenous("A", &frame, &future_dates)
            .unwrap();

        assert_eq!(future.nrows(), 3);
        for row in &future.values {
            assert_eq!(row.as_slice(), observed.last_row().unwrap());
        }
    }

    #[test]
    fn test_future_exogenous_mean_policy() {
        let frame = frame_with_features();
        let config = EngineConfig {
            extrapolation_policy: ExtrapolationPolicy::Mean,
            ..Default::default()
        };
        let manager = EncoderManager::fit(&frame, &candidates(), &config);

        let observed = manager.transform_for_sku("A", &frame).unwrap();
        let future = manager
            .future_exogenous("A", &frame, &[date(20)])
            .unwrap();
        assert_eq!(future.values[0], observed.column_means());
    }

    #[test]
    fn test_manifest_lists_active_columns() {
        let frame = frame_with_features();
        let manager = EncoderManager::fit(&frame, &candidates(), &EngineConfig::default());
        let manifest = manager.manifest();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].sku, "A");
        assert_eq!(manifest[0].feature_columns, vec!["Price", "Region"]);
        assert!(manifest[1].feature_columns.is_empty());
    }

    #[test]
    fn test_global_transform_uses_shared_columns_only() {
        let frame = frame_with_features();
        let manager = EncoderManager::fit(&frame, &candidates(), &EngineConfig::default());
        // A and B share no admissible column.
        assert!(manager.transform_global(&frame).is_none());
    }
}
