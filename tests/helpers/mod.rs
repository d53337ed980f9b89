//! Builders for test frames
//!
//! Shared constructors for CleanFrames with controllable shape: SKU count,
//! history length, quantity generator, and optional auxiliary columns.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use stocksight::{AuxColumn, AuxValue, CleanFrame, DateFormat};

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn day(offset: u32) -> NaiveDate {
    start_date() + chrono::Duration::days(offset as i64)
}

/// Builder for CleanFrame test fixtures.
pub struct FrameBuilder {
    skus: Vec<String>,
    days: u32,
    quantity: Box<dyn Fn(&str, u32) -> f64>,
    aux: BTreeMap<String, Box<dyn Fn(&str, u32) -> AuxValue>>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self {
            skus: vec!["SKU-A".to_string()],
            days: 30,
            quantity: Box::new(|_, _| 100.0),
            aux: BTreeMap::new(),
        }
    }
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skus(mut self, names: &[&str]) -> Self {
        self.skus = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sku_count(mut self, count: usize) -> Self {
        self.skus = (0..count).map(|i| format!("SKU-{:03}", i)).collect();
        self
    }

    pub fn days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn quantity(mut self, f: impl Fn(&str, u32) -> f64 + 'static) -> Self {
        self.quantity = Box::new(f);
        self
    }

    pub fn aux_column(
        mut self,
        name: &str,
        f: impl Fn(&str, u32) -> AuxValue + 'static,
    ) -> Self {
        self.aux.insert(name.to_string(), Box::new(f));
        self
    }

    pub fn build(self) -> CleanFrame {
        let mut dates = Vec::new();
        let mut skus = Vec::new();
        let mut quantities = Vec::new();
        let mut aux_values: BTreeMap<String, Vec<AuxValue>> = self
            .aux
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        for d in 0..self.days {
            for sku in &self.skus {
                dates.push(day(d));
                skus.push(sku.clone());
                quantities.push((self.quantity)(sku, d));
                for (name, generator) in &self.aux {
                    aux_values
                        .get_mut(name)
                        .unwrap()
                        .push(generator(sku, d));
                }
            }
        }

        let aux = aux_values
            .into_iter()
            .map(|(name, values)| (name, AuxColumn::new(values)))
            .collect();
        CleanFrame::from_columns(dates, skus, quantities, aux, DateFormat::Iso)
            .expect("builder produces a valid frame")
    }
}

/// A 30-day single-SKU frame with constant quantity 100.
pub fn constant_frame() -> CleanFrame {
    FrameBuilder::new().build()
}
