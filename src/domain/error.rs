use thiserror::Error;

pub type Result<T> = std::result::Result<T, StockSightError>;

#[derive(Error, Debug)]
pub enum StockSightError {
    #[error("Ingestion error: {0}")]
    Ingest(#[from] crate::ingest::IngestError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] crate::forecasting::ForecastError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] crate::scenario::ScenarioError),

    #[error("Export error: {0}")]
    Export(#[from] crate::export::ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StockSightError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        StockSightError::Config(msg.into())
    }

    pub fn invalid_frame<S: Into<String>>(msg: S) -> Self {
        StockSightError::InvalidFrame(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        StockSightError::Internal(msg.into())
    }
}
