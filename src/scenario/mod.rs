// What-if rewrites of the cleaned history: demand spikes and supply delays

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DuplicatePolicy, EngineConfig};
use crate::domain::{AuxColumn, AuxValue, CleanFrame};

/// Scenario error types
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Spike multiplier {multiplier} outside [{min}, {max}]")]
    MultiplierOutOfBounds {
        multiplier: f64,
        min: f64,
        max: f64,
    },

    #[error("Delay of {delay_days} days outside [{min}, {max}]")]
    DelayOutOfBounds {
        delay_days: i64,
        min: i64,
        max: i64,
    },

    #[error("Unknown SKU: {0}")]
    UnknownSku(String),

    #[error("Window start {start} is after end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("Frame error: {0}")]
    Frame(String),
}

pub type ScenarioResult<T> = std::result::Result<T, ScenarioError>;

/// One destructive rewrite of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    /// Multiply the SKU's quantities inside the window.
    DemandSpike {
        sku: String,
        start: NaiveDate,
        end: NaiveDate,
        multiplier: f64,
    },
    /// Re-attribute the SKU's quantities from `start` onward to
    /// `delay_days` later; rows may extend past the last observed date.
    SupplyDelay {
        sku: String,
        start: NaiveDate,
        delay_days: i64,
    },
}

impl Scenario {
    pub fn sku(&self) -> &str {
        match self {
            Scenario::DemandSpike { sku, .. } => sku,
            Scenario::SupplyDelay { sku, .. } => sku,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::DemandSpike { .. } => "demand_spike",
            Scenario::SupplyDelay { .. } => "supply_delay",
        }
    }
}

/// One applied scenario, kept for display and reset bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub scenario: Scenario,
    pub applied_at: DateTime<Utc>,
}

/// Apply a scenario, returning a new frame. The input is untouched so the
/// caller can keep it for reset.
pub fn apply_scenario(
    frame: &CleanFrame,
    scenario: &Scenario,
    config: &EngineConfig,
) -> ScenarioResult<CleanFrame> {
    if !frame.sku_names().iter().any(|s| s == scenario.sku()) {
        return Err(ScenarioError::UnknownSku(scenario.sku().to_string()));
    }

    let result = match scenario {
        Scenario::DemandSpike {
            sku,
            start,
            end,
            multiplier,
        } => apply_spike(frame, sku, *start, *end, *multiplier, config),
        Scenario::SupplyDelay {
            sku,
            start,
            delay_days,
        } => apply_delay(frame, sku, *start, *delay_days, config),
    }?;

    info!(
        scenario = scenario.label(),
        sku = scenario.sku(),
        rows = result.len(),
        "scenario applied"
    );
    Ok(result)
}

fn apply_spike(
    frame: &CleanFrame,
    sku: &str,
    start: NaiveDate,
    end: NaiveDate,
    multiplier: f64,
    config: &EngineConfig,
) -> ScenarioResult<CleanFrame> {
    if multiplier < config.min_spike || multiplier > config.max_spike {
        return Err(ScenarioError::MultiplierOutOfBounds {
            multiplier,
            min: config.min_spike,
            max: config.max_spike,
        });
    }
    if start > end {
        return Err(ScenarioError::InvalidWindow { start, end });
    }

    let quantities: Vec<f64> = (0..frame.len())
        .map(|i| {
            let q = frame.quantities()[i];
            let date = frame.dates()[i];
            if frame.skus()[i] == sku && date >= start && date <= end {
                q * multiplier
            } else {
                q
            }
        })
        .collect();

    CleanFrame::from_columns(
        frame.dates().to_vec(),
        frame.skus().to_vec(),
        quantities,
        frame.aux().clone(),
        frame.date_format(),
    )
    .map_err(|e| ScenarioError::Frame(e.to_string()))
}

fn apply_delay(
    frame: &CleanFrame,
    sku: &str,
    start: NaiveDate,
    delay_days: i64,
    config: &EngineConfig,
) -> ScenarioResult<CleanFrame> {
    if delay_days < config.min_delay_days || delay_days > config.max_delay_days {
        return Err(ScenarioError::DelayOutOfBounds {
            delay_days,
            min: config.min_delay_days,
            max: config.max_delay_days,
        });
    }

    let aux_names = frame.aux_names();

    // Shift matching rows, then re-reduce any (date, sku) collisions the
    // shift created under the configured duplicate policy.
    let mut merged: BTreeMap<(NaiveDate, String), (f64, usize, Vec<AuxValue>)> = BTreeMap::new();
    for i in 0..frame.len() {
        let mut date = frame.dates()[i];
        if frame.skus()[i] == sku && date >= start {
            date = date + Duration::days(delay_days);
        }
        let quantity = frame.quantities()[i];
        let aux_row: Vec<AuxValue> = aux_names
            .iter()
            .map(|name| frame.aux_column(name).map(|c| c.values[i].clone()))
            .map(|v| v.unwrap_or(AuxValue::Null))
            .collect();

        merged
            .entry((date, frame.skus()[i].clone()))
            .and_modify(|(acc, count, aux)| {
                *count += 1;
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

    let mut dates = Vec::with_capacity(merged.len());
    let mut skus = Vec::with_capacity(merged.len());
    let mut quantities = Vec::with_capacity(merged.len());
    let mut aux_values: Vec<Vec<AuxValue>> = vec![Vec::with_capacity(merged.len()); aux_names.len()];
    for ((date, name), (acc, count, aux_row)) in merged {
        dates.push(date);
        skus.push(name);
        quantities.push(match config.duplicate_policy {
            DuplicatePolicy::Mean => acc / count as f64,
            _ => acc,
        });
        for (col, value) in aux_values.iter_mut().zip(aux_row) {
            col.push(value);
        }
    }
    let aux: BTreeMap<String, AuxColumn> = aux_names
        .into_iter()
        .zip(aux_values)
        .map(|(name, values)| (name, AuxColumn::new(values)))
        .collect();

    CleanFrame::from_columns(dates, skus, quantities, aux, frame.date_format())
        .map_err(|e| ScenarioError::Frame(e.to_string()))
}
