// Forecast bundle export: three CSV matrices plus a plain-text summary

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::forecasting::{ForecastBundle, SkuForecast};

use super::ExportResult;

/// Paths written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFiles {
    pub data: PathBuf,
    pub upper: PathBuf,
    pub lower: PathBuf,
    pub summary: PathBuf,
}

/// Write `forecast_data.csv`, `forecast_upper.csv`, `forecast_lower.csv`,
/// and `summary.txt` into `dir`.
///
/// Every CSV shares the same shape: a `Date` header followed by the
/// lexicographically sorted SKU names, one row per future date, with dates
/// rendered in the bundle's detected format.
pub fn write_bundle(dir: &Path, bundle: &ForecastBundle) -> ExportResult<BundleFiles> {
    std::fs::create_dir_all(dir)?;

    let files = BundleFiles {
        data: dir.join("forecast_data.csv"),
        upper: dir.join("forecast_upper.csv"),
        lower: dir.join("forecast_lower.csv"),
        summary: dir.join("summary.txt"),
    };

    write_matrix(&files.data, bundle, |f| &f.point)?;
    write_matrix(&files.upper, bundle, |f| &f.upper)?;
    write_matrix(&files.lower, bundle, |f| &f.lower)?;
    std::fs::write(&files.summary, render_summary(bundle))?;

    info!(dir = %dir.display(), skus = bundle.forecasts.len(), "bundle exported");
    Ok(files)
}

fn write_matrix(
    path: &Path,
    bundle: &ForecastBundle,
    series: impl Fn(&SkuForecast) -> &Vec<f64>,
) -> ExportResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["Date".to_string()];
    header.extend(bundle.sku_names());
    writer.write_record(&header)?;

    for (row, date) in bundle.dates.iter().enumerate() {
        let mut record = vec![bundle.date_format.render(*date)];
        for forecast in &bundle.forecasts {
            record.push(series(forecast)[row].to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn render_summary(bundle: &ForecastBundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Forecast Summary");
    let _ = writeln!(out, "================");
    let _ = writeln!(out, "Run:         {}", bundle.run_id);
    let _ = writeln!(
        out,
        "Generated:   {}",
        bundle.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Granularity: {}", bundle.granularity);
    let _ = writeln!(out, "Horizon:     {} periods", bundle.horizon_periods);
    let _ = writeln!(out);

    let _ = writeln!(out, "Per-SKU forecast totals");
    let _ = writeln!(out, "-----------------------");
    for forecast in &bundle.forecasts {
        let total: f64 = forecast.point.iter().sum();
        let _ = writeln!(
            out,
            "{}: {:.2} ({}, {} history points)",
            forecast.sku,
            total,
            forecast.metadata.model_name,
            forecast.metadata.data_points_used
        );
    }

    if !bundle.skipped.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped SKUs");
        let _ = writeln!(out, "------------");
        for skip in &bundle.skipped {
            let _ = writeln!(out, "{}: {}", skip.sku, skip.reason);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::domain::DateFormat;
    use crate::forecasting::{Granularity, SkippedSku, SkuForecastMeta};

    fn bundle() -> ForecastBundle {
        let dates: Vec<NaiveDate> = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap())
            .collect();
        let meta = SkuForecastMeta {
            data_points_used: 30,
            feature_count: 0,
            seasonality_detected: false,
            seasonal_period: None,
            model_name: "Seasonal Naive".into(),
            metrics: None,
        };
        ForecastBundle {
            run_id: Uuid::nil(),
            created_at: Utc::now(),
            granularity: Granularity::Daily,
            horizon_periods: 3,
            date_format: DateFormat::Iso,
            dates: dates.clone(),
            forecasts: vec![
                SkuForecast {
                    sku: "A".into(),
                    dates: dates.clone(),
                    point: vec![1.0, 2.0, 3.0],
                    upper: vec![2.0, 3.0, 4.0],
                    lower: vec![0.5, 1.0, 2.0],
                    metadata: meta.clone(),
                },
                SkuForecast {
                    sku: "B".into(),
                    dates,
                    point: vec![10.0, 10.0, 10.0],
                    upper: vec![12.0, 12.0, 12.0],
                    lower: vec![8.0, 8.0, 8.0],
                    metadata: meta,
                },
            ],
            skipped: vec![SkippedSku {
                sku: "C".into(),
                reason: "series is all zeros".into(),
            }],
        }
    }

    #[test]
    fn test_write_bundle_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_bundle(dir.path(), &bundle()).unwrap();

        let data = std::fs::read_to_string(&files.data).unwrap();
        let mut lines = data.lines();
        assert_eq!(lines.next(), Some("Date,A,B"));
        assert_eq!(lines.next(), Some("2024-02-01,1,10"));
        assert_eq!(lines.next(), Some("2024-02-02,2,10"));
        assert_eq!(lines.next(), Some("2024-02-03,3,10"));

        let upper = std::fs::read_to_string(&files.upper).unwrap();
        assert!(upper.contains("2024-02-01,2,12"));
        let lower = std::fs::read_to_string(&files.lower).unwrap();
        assert!(lower.contains("2024-02-01,0.5,8"));
    }

    #[test]
    fn test_summary_contents() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_bundle(dir.path(), &bundle()).unwrap();

        let summary = std::fs::read_to_string(&files.summary).unwrap();
        assert!(summary.contains("Granularity: Daily"));
        assert!(summary.contains("Horizon:     3 periods"));
        assert!(summary.contains("A: 6.00"));
        assert!(summary.contains("B: 30.00"));
        assert!(summary.contains("C: series is all zeros"));
    }

    #[test]
    fn test_dates_use_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut slashed = bundle();
        slashed.date_format = DateFormat::DayMonthSlash;
        let files = write_bundle(dir.path(), &slashed).unwrap();

        let data = std::fs::read_to_string(&files.data).unwrap();
        assert!(data.contains("01/02/2024,1,10"));
    }

    #[test]
    fn test_export_is_reproducible() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let b = bundle();
        write_bundle(dir_a.path(), &b).unwrap();
        write_bundle(dir_b.path(), &b).unwrap();

        for name in ["forecast_data.csv", "forecast_upper.csv", "forecast_lower.csv"] {
            let a = std::fs::read(dir_a.path().join(name)).unwrap();
            let b = std::fs::read(dir_b.path().join(name)).unwrap();
            assert_eq!(a, b, "{name}");
        }
    }
}
