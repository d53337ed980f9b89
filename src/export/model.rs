// Persisted fitted model: versioned header plus opaque strategy payload

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::features::EncoderManifestEntry;
use crate::forecasting::Granularity;

use super::{ExportError, ExportResult};

/// Magic string identifying the persisted-model format.
pub const MODEL_MAGIC: &str = "STOCKSIGHT_MODEL_V1";

/// Versioned header written ahead of the strategy payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHeader {
    pub magic: String,
    pub granularity: Granularity,
    pub horizon_periods: usize,
    pub sku_list: Vec<String>,
    pub encoder_manifest: Vec<EncoderManifestEntry>,
}

impl ModelHeader {
    pub fn new(
        granularity: Granularity,
        horizon_periods: usize,
        sku_list: Vec<String>,
        encoder_manifest: Vec<EncoderManifestEntry>,
    ) -> Self {
        Self {
            magic: MODEL_MAGIC.to_string(),
            granularity,
            horizon_periods,
            sku_list,
            encoder_manifest,
        }
    }

    /// Header describing a completed run, ready to carry a strategy payload.
    pub fn for_run(
        bundle: &crate::forecasting::ForecastBundle,
        encoder_manifest: Vec<EncoderManifestEntry>,
    ) -> Self {
        Self::new(
            bundle.granularity,
            bundle.horizon_periods,
            bundle.sku_names(),
            encoder_manifest,
        )
    }
}

/// A fitted model on disk: the header plus strategy-specific bytes the
/// engine treats as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    pub header: ModelHeader,
    pub payload: Vec<u8>,
}

pub fn save_model(path: &Path, model: &PersistedModel) -> ExportResult<()> {
    let bytes = bincode::serialize(model)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Load a persisted model, rejecting anything without the expected magic.
pub fn load_model(path: &Path) -> ExportResult<PersistedModel> {
    let bytes = std::fs::read(path)?;
    let model: PersistedModel = bincode::deserialize(&bytes)?;
    if model.header.magic != MODEL_MAGIC {
        return Err(ExportError::InvalidModel {
            found: model.header.magic,
            expected: MODEL_MAGIC.to_string(),
        });
    }
    Ok(model)
}
