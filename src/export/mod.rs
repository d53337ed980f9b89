// Export: forecast CSV matrices, summary report, persisted model blob

pub mod files;
pub mod model;

pub use files::{write_bundle, BundleFiles};
pub use model::{load_model, save_model, ModelHeader, PersistedModel, MODEL_MAGIC};

/// Export error types
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("Not a persisted model: magic '{found}' does not match '{expected}'")]
    InvalidModel { found: String, expected: String },

    #[error("Format error: {0}")]
    FormatError(String),
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;
