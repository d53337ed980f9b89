// Date formats recognized in raw input, remembered for round-trip display

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A date format a raw table can be fingerprinted against.
///
/// The variants are ordered by detection priority; the first format that
/// parses at least 95% of a sample wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `2024-03-15`
    Iso,
    /// `15 Mar 2024`
    DayMonthAbbr,
    /// `15 March 2024`
    DayMonthFull,
    /// `Mar 15, 2024`
    MonthAbbrDay,
    /// `03/15/2024`
    MonthDaySlash,
    /// `15/03/2024`
    DayMonthSlash,
}

impl DateFormat {
    /// All formats in detection priority order.
    pub const RANKED: [DateFormat; 6] = [
        DateFormat::Iso,
        DateFormat::DayMonthAbbr,
        DateFormat::DayMonthFull,
        DateFormat::MonthAbbrDay,
        DateFormat::MonthDaySlash,
        DateFormat::DayMonthSlash,
    ];

    /// The chrono format string for this format.
    pub fn format_str(&self) -> &'static str {
        match self {
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::DayMonthAbbr => "%d %b %Y",
            DateFormat::DayMonthFull => "%d %B %Y",
            DateFormat::MonthAbbrDay => "%b %d, %Y",
            DateFormat::MonthDaySlash => "%m/%d/%Y",
            DateFormat::DayMonthSlash => "%d/%m/%Y",
        }
    }

    /// Parse a raw cell with this format.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), self.format_str()).ok()
    }

    /// Render a date back in this format for display and export.
    pub fn render(&self, date: NaiveDate) -> String {
        date.format(self.format_str()).to_string()
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::Iso
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_str())
    }
}
