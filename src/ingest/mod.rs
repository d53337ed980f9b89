// Ingestion: raw table loading, column detection, validation, cleaning

pub mod clean;
pub mod columns;
pub mod dates;
pub mod reader;

pub use clean::{clean, validate, CleanReport, DroppedSku, ValidationReport};
pub use columns::{detect_columns, ColumnMapping, ColumnRole, SuggestedMapping};
pub use dates::{detect_date_format, FormatDetection, DETECTION_THRESHOLD};
pub use reader::{load, load_sheet, LoadOutcome, RawTable, SheetInfo};

/// Ingestion error types
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Missing required column: {0}")]
    MissingRequiredColumn(String),

    #[error("No date format parses at least {threshold:.0}% of the '{column}' column (best: {best_rate:.1}%)")]
    UnparseableDate {
        column: String,
        threshold: f64,
        best_rate: f64,
    },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Input table is empty")]
    EmptyTable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Frame error: {0}")]
    Frame(String),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
