// Date-format fingerprinting over a raw column

use crate::domain::DateFormat;

/// Share of cells a format must parse to be accepted.
pub const DETECTION_THRESHOLD: f64 = 0.95;

/// Outcome of fingerprinting one column of raw date cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatDetection {
    pub format: DateFormat,
    pub success_rate: f64,
}

/// Try the ranked formats against the non-empty cells; the first format
/// reaching [`DETECTION_THRESHOLD`] wins.
///
/// Returns the best-scoring attempt on failure so the caller can report how
/// close it came.
pub fn detect_date_format(cells: &[&str]) -> Result<FormatDetection, FormatDetection> {
    let samples: Vec<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let mut best = FormatDetection {
        format: DateFormat::Iso,
        success_rate: 0.0,
    };

    if samples.is_empty() {
        return Err(best);
    }

    for format in DateFormat::RANKED {
        let hits = samples.iter().filter(|s| format.parse(s).is_some()).count();
        let rate = hits as f64 / samples.len() as f64;
        if rate >= DETECTION_THRESHOLD {
            return Ok(FormatDetection {
                format,
                success_rate: rate,
            });
        }
        if rate > best.success_rate {
            best = FormatDetection {
                format,
                success_rate: rate,
            };
        }
    }

    Err(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_iso() {
        let cells = vec!["2024-01-01", "2024-01-02", "2024-02-10"];
        let detection = detect_date_format(&cells).unwrap();
        assert_eq!(detection.format, DateFormat::Iso);
        assert_eq!(detection.success_rate, 1.0);
    }

    #[test]
    fn test_detect_month_name() {
        let cells = vec!["15 Mar 2024", "16 Mar 2024", "01 Apr 2024"];
        let detection = detect_date_format(&cells).unwrap();
        assert_eq!(detection.format, DateFormat::DayMonthAbbr);
    }

    #[test]
    fn test_ambiguous_slash_dates_prefer_month_first() {
        // Every cell parses under both slash formats; rank order decides.
        let cells = vec!["01/02/2024", "03/04/2024", "05/06/2024"];
        let detection = detect_date_format(&cells).unwrap();
        assert_eq!(detection.format, DateFormat::MonthDaySlash);
    }

    #[test]
    fn test_day_first_when_month_first_impossible() {
        let cells = vec!["25/01/2024", "26/01/2024", "27/01/2024"];
        let detection = detect_date_format(&cells).unwrap();
        assert_eq!(detection.format, DateFormat::DayMonthSlash);
    }

    #[test]
    fn test_below_threshold_fails_with_best() {
        let cells = vec!["2024-01-01", "not a date", "also not"];
        let err = detect_date_format(&cells).unwrap_err();
        assert!(err.success_rate < DETECTION_THRESHOLD);
        assert!(err.success_rate > 0.0);
    }

    #[test]
    fn test_empty_cells_ignored() {
        let cells = vec!["2024-01-01", "", "  ", "2024-01-02"];
        let detection = detect_date_format(&cells).unwrap();
        assert_eq!(detection.format, DateFormat::Iso);
        assert_eq!(detection.success_rate, 1.0);
    }

    #[test]
    fn test_all_empty_fails() {
        let cells = vec!["", ""];
        assert!(detect_date_format(&cells).is_err());
    }
}
