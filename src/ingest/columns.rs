// Column-role suggestion from header names

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::reader::RawTable;

/// The semantic roles a column can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    Sku,
    Quantity,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 3] = [ColumnRole::Date, ColumnRole::Sku, ColumnRole::Quantity];

    fn keywords(&self) -> &'static [&'static str] {
        ROLE_KEYWORDS
            .iter()
            .find(|(role, _)| role == self)
            .map(|(_, words)| words.as_slice())
            .unwrap_or(&[])
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRole::Date => write!(f, "date"),
            ColumnRole::Sku => write!(f, "sku"),
            ColumnRole::Quantity => write!(f, "quantity"),
        }
    }
}

/// Keyword bag per role, in match-priority order.
static ROLE_KEYWORDS: Lazy<Vec<(ColumnRole, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            ColumnRole::Date,
            vec!["date", "time", "timestamp", "day", "period", "datetime"],
        ),
        (
            ColumnRole::Sku,
            vec!["sku", "product", "item", "code", "article", "id"],
        ),
        (
            ColumnRole::Quantity,
            vec![
                "quantity", "qty", "count", "units", "sales", "demand", "sold", "volume",
            ],
        ),
    ]
});

/// A caller-confirmed mapping of columns to roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: String,
    pub sku: String,
    pub quantity: String,
}

impl ColumnMapping {
    pub fn column_for(&self, role: ColumnRole) -> &str {
        match role {
            ColumnRole::Date => &self.date,
            ColumnRole::Sku => &self.sku,
            ColumnRole::Quantity => &self.quantity,
        }
    }
}

/// A best-guess mapping; never applied without caller confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedMapping {
    pub date: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<String>,
}

impl SuggestedMapping {
    /// Promote the suggestion to a confirmed mapping if every role matched.
    pub fn confirm(self) -> Option<ColumnMapping> {
        Some(ColumnMapping {
            date: self.date?,
            sku: self.sku?,
            quantity: self.quantity?,
        })
    }
}

/// Suggest the best candidate column for each role.
///
/// Exact keyword matches win over substring matches; within a tier the
/// earliest header wins. A column is only suggested for one role.
pub fn detect_columns(table: &RawTable) -> SuggestedMapping {
    let normalized: Vec<String> = table
        .headers
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let mut taken: Vec<usize> = Vec::new();
    let mut suggestion = SuggestedMapping::default();

    for role in ColumnRole::ALL {
        let found = best_match(&normalized, role.keywords(), &taken);
        if let Some(idx) = found {
            taken.push(idx);
            let name = Some(table.headers[idx].clone());
            match role {
                ColumnRole::Date => suggestion.date = name,
                ColumnRole::Sku => suggestion.sku = name,
                ColumnRole::Quantity => suggestion.quantity = name,
            }
        }
    }

    suggestion
}

fn best_match(normalized: &[String], keywords: &[&str], taken: &[usize]) -> Option<usize> {
    // Exact tier first; within a tier the earliest header wins.
    for (idx, header) in normalized.iter().enumerate() {
        if !taken.contains(&idx) && keywords.iter().any(|k| header == k) {
            return Some(idx);
        }
    }
    for (idx, header) in normalized.iter().enumerate() {
        if !taken.contains(&idx) && keywords.iter().any(|k| header.contains(k)) {
            return Some(idx);
        }
    }
    None
}
