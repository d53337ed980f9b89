// Per-SKU feature admission and encoding

pub mod classify;
pub mod encoder;
pub mod manager;

pub use classify::{
    categorical_variance_ok, classify, coverage, mean_std, numeric_variance_ok, ColumnKind,
};
pub use encoder::{ExogenousMatrix, FeatureEncoding, SkuEncoder};
pub use manager::{EncoderManager, EncoderManifestEntry, FeatureRejection, RejectionReason};
