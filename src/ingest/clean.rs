// Validation and cleaning of raw tables into CleanFrames

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DuplicatePolicy, EngineConfig, FillPolicy, NegativePolicy};
use crate::domain::{AuxColumn, AuxValue, CleanFrame, DateFormat};

use super::columns::{ColumnMapping, ColumnRole};
use super::dates::{detect_date_format, DETECTION_THRESHOLD};
use super::reader::RawTable;
use super::{IngestError, IngestResult};

const MAX_SKU_LEN: usize = 128;

/// What validation found in a structurally acceptable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub detected_format: DateFormat,
    pub date_success_rate: f64,
    /// Null counts per auxiliary column, informational only.
    pub null_counts: BTreeMap<String, usize>,
}

/// One SKU removed during cleaning, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedSku {
    pub sku: String,
    pub reason: String,
}

/// Bookkeeping for one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_merged: usize,
    pub rows_filled: usize,
    pub rows_skipped: usize,
    pub dropped_skus: Vec<DroppedSku>,
}

/// Check a raw table against a confirmed mapping.
///
/// Fails with an ordered issue list when the table cannot be cleaned;
/// unparseable dates get their own error so the caller can prompt a remap.
pub fn validate(
    table: &RawTable,
    mapping: &ColumnMapping,
    config: &EngineConfig,
) -> IngestResult<ValidationReport> {
    require_columns(table, mapping)?;

    let date_cells = table.column(&mapping.date).unwrap_or_default();
    let detection = detect_date_format(&date_cells).map_err(|best| {
        IngestError::UnparseableDate {
            column: mapping.date.clone(),
            threshold: DETECTION_THRESHOLD * 100.0,
            best_rate: best.success_rate * 100.0,
        }
    })?;

    let mut issues = Vec::new();

    for role in [ColumnRole::Date, ColumnRole::Sku, ColumnRole::Quantity] {
        let name = mapping.column_for(role);
        let empty = table
            .column(name)
            .map(|cells| cells.iter().filter(|c| c.trim().is_empty()).count())
            .unwrap_or(0);
        if empty > 0 {
            issues.push(format!("Column '{}' has {} missing values", name, empty));
        }
    }

    let quantity_cells = table.column(&mapping.quantity).unwrap_or_default();
    let non_numeric = quantity_cells
        .iter()
        .filter(|c| !c.trim().is_empty() && c.trim().parse::<f64>().is_err())
        .count();
    if non_numeric > 0 {
        issues.push(format!(
            "Column '{}' has {} non-numeric values",
            mapping.quantity, non_numeric
        ));
    }

    if config.negative_policy == NegativePolicy::Reject {
        let negatives = quantity_cells
            .iter()
            .filter_map(|c| c.trim().parse::<f64>().ok())
            .filter(|q| *q < 0.0)
            .count();
        if negatives > 0 {
            issues.push(format!(
                "Column '{}' has {} negative values",
                mapping.quantity, negatives
            ));
        }
    }

    if !issues.is_empty() {
        return Err(IngestError::Validation(issues));
    }

    let mut null_counts = BTreeMap::new();
    for header in &table.headers {
        if is_mapped(header, mapping) {
            continue;
        }
        if let Some(cells) = table.column(header) {
            let nulls = cells.iter().filter(|c| c.trim().is_empty()).count();
            null_counts.insert(header.clone(), nulls);
        }
    }

    Ok(ValidationReport {
        detected_format: detection.format,
        date_success_rate: detection.success_rate,
        null_counts,
    })
}

/// Turn a validated raw table into a CleanFrame.
///
/// Renames mapped columns to their canonical roles, coerces types, reduces
/// duplicate `(date, sku)` rows under the configured policy, optionally
/// fills gaps inside each SKU's observed range, and drops SKUs with fewer
/// than `min_data_points` rows.
pub fn clean(
    table: &RawTable,
    mapping: &ColumnMapping,
    config: &EngineConfig,
) -> IngestResult<(CleanFrame, CleanReport)> {
    require_columns(table, mapping)?;

    let date_cells = table.column(&mapping.date).unwrap_or_default();
    let format = detect_date_format(&date_cells)
        .map_err(|best| IngestError::UnparseableDate {
            column: mapping.date.clone(),
            threshold: DETECTION_THRESHOLD * 100.0,
            best_rate: best.success_rate * 100.0,
        })?
        .format;

    let date_idx = table
        .column_index(&mapping.date)
        .expect("checked by require_columns");
    let sku_idx = table
        .column_index(&mapping.sku)
        .expect("checked by require_columns");
    let quantity_idx = table
        .column_index(&mapping.quantity)
        .expect("checked by require_columns");
    let aux_headers: Vec<(usize, String)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_mapped(h, mapping))
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let mut report = CleanReport {
        rows_in: table.row_count(),
        ..Default::default()
    };

    // (date, sku) -> (quantity accumulator, dup count, aux row)
    let mut merged: BTreeMap<(NaiveDate, String), (f64, usize, Vec<AuxValue>)> = BTreeMap::new();

    for row in &table.rows {
        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("").trim();

        let Some(date) = format.parse(cell(date_idx)) else {
            report.rows_skipped += 1;
            continue;
        };
        let sku_raw = cell(sku_idx);
        if sku_raw.is_empty() {
            report.rows_skipped += 1;
            continue;
        }
        let sku: String = sku_raw.chars().take(MAX_SKU_LEN).collect();

        let Ok(mut quantity) = cell(quantity_idx).parse::<f64>() else {
            report.rows_skipped += 1;
            continue;
        };
        if !quantity.is_finite() {
            report.rows_skipped += 1;
            continue;
        }
        if quantity < 0.0 {
            match config.negative_policy {
                NegativePolicy::Absolutize => quantity = quantity.abs(),
                NegativePolicy::Reject => {
                    report.rows_skipped += 1;
                    continue;
                }
            }
        }

        let aux_row: Vec<AuxValue> = aux_headers
            .iter()
            .map(|(idx, _)| parse_aux(cell(*idx)))
            .collect();

        merged
            .entry((date, sku))
            .and_modify(|(acc, count, aux)| {
                *count += 1;
                report.duplicates_merged += 1;
                match config.duplicate_policy {
                    DuplicatePolicy::Sum | DuplicatePolicy::Mean => *acc += quantity,
                    DuplicatePolicy::Last => *acc = quantity,
                }
                for (slot, value) in aux.iter_mut().zip(&aux_row) {
                    if !value.is_null() {
                        *slot = value.clone();
                    }
                }
            })
            .or_insert((quantity, 1, aux_row));
    }

    if merged.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    // Resolve the mean policy now that duplicate counts are final.
    let mut rows: Vec<(NaiveDate, String, f64, Vec<AuxValue>)> = merged
        .into_iter()
        .map(|((date, sku), (acc, count, aux))| {
            let quantity = match config.duplicate_policy {
                DuplicatePolicy::Mean => acc / count as f64,
                _ => acc,
            };
            (date, sku, quantity, aux)
        })
        .collect();

    if config.fill_policy != FillPolicy::None {
        report.rows_filled = fill_gaps(&mut rows, config.fill_policy, aux_headers.len());
    }

    // Drop SKUs below the minimum history length.
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, sku, _, _) in &rows {
        *counts.entry(sku.as_str()).or_insert(0) += 1;
    }
    let dropped: Vec<DroppedSku> = counts
        .iter()
        .filter(|(_, &n)| n < config.min_data_points)
        .map(|(sku, &n)| DroppedSku {
            sku: sku.to_string(),
            reason: format!(
                "insufficient data: {} rows (minimum {})",
                n, config.min_data_points
            ),
        })
        .collect();
    for d in &dropped {
        warn!(sku = %d.sku, reason = %d.reason, "dropping SKU");
    }
    let dropped_names: Vec<&str> = dropped.iter().map(|d| d.sku.as_str()).collect();
    rows.retain(|(_, sku, _, _)| !dropped_names.contains(&sku.as_str()));
    report.dropped_skus = dropped;

    if rows.is_empty() {
        return Err(IngestError::EmptyTable);
    }

    let mut dates = Vec::with_capacity(rows.len());
    let mut skus = Vec::with_capacity(rows.len());
    let mut quantities = Vec::with_capacity(rows.len());
    let mut aux_values: Vec<Vec<AuxValue>> = vec![Vec::with_capacity(rows.len()); aux_headers.len()];
    for (date, sku, quantity, aux) in rows {
        dates.push(date);
        skus.push(sku);
        quantities.push(quantity);
        for (col, value) in aux_values.iter_mut().zip(aux) {
            col.push(value);
        }
    }
    let aux: BTreeMap<String, AuxColumn> = aux_headers
        .iter()
        .zip(aux_values)
        .map(|((_, name), values)| (name.clone(), AuxColumn::new(values)))
        .collect();

    report.rows_out = dates.len();

    let frame = CleanFrame::from_columns(dates, skus, quantities, aux, format)
        .map_err(|e| IngestError::Frame(e.to_string()))?;

    info!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        duplicates = report.duplicates_merged,
        dropped_skus = report.dropped_skus.len(),
        "cleaned raw table"
    );

    Ok((frame, report))
}

fn require_columns(table: &RawTable, mapping: &ColumnMapping) -> IngestResult<()> {
    for role in ColumnRole::ALL {
        let name = mapping.column_for(role);
        if table.column_index(name).is_none() {
            return Err(IngestError::MissingRequiredColumn(name.to_string()));
        }
    }
    Ok(())
}

fn is_mapped(header: &str, mapping: &ColumnMapping) -> bool {
    header == mapping.date || header == mapping.sku || header == mapping.quantity
}

fn parse_aux(cell: &str) -> AuxValue {
    if cell.is_empty() {
        AuxValue::Null
    } else if let Ok(n) = cell.parse::<f64>() {
        AuxValue::Number(n)
    } else {
        AuxValue::Text(cell.to_string())
    }
}

/// Insert missing days inside each SKU's observed range. Rows must be
/// sorted by `(date, sku)` on entry; the sort is re-established afterwards.
fn fill_gaps(
    rows: &mut Vec<(NaiveDate, String, f64, Vec<AuxValue>)>,
    policy: FillPolicy,
    aux_width: usize,
) -> usize {
    let mut by_sku: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for (date, sku, quantity, _) in rows.iter() {
        by_sku
            .entry(sku.clone())
            .or_default()
            .push((*date, *quantity));
    }

    let mut inserted = 0;
    for (sku, observed) in by_sku {
        let mut last_quantity = 0.0;
        let (first, _) = observed[0];
        let (last, _) = observed[observed.len() - 1];
        let mut idx = 0;
        let mut day = first;
        while day <= last {
            if idx < observed.len() && observed[idx].0 == day {
                last_quantity = observed[idx].1;
                idx += 1;
            } else {
                let quantity = match policy {
                    FillPolicy::ForwardFill => last_quantity,
                    FillPolicy::ZeroFill => 0.0,
                    FillPolicy::None => unreachable!("fill_gaps not called for None"),
                };
                rows.push((day, sku.clone(), quantity, vec![AuxValue::Null; aux_width]));
                inserted += 1;
            }
            day = day.succ_opt().expect("date overflow");
        }
    }

    rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    inserted
}
