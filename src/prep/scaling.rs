// Magnitude scaling to keep iterative solvers inside a stable range

use serde::{Deserialize, Serialize};
use tracing::info;

const HARD_LIMIT: f64 = 1e6;
const SOFT_LIMIT: f64 = 1e4;

/// The scale factor applied to quantities before training.
///
/// Quantities are divided by the factor before fit and every forecast output
/// is multiplied by it afterwards, so the scaling is invisible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeScale {
    factor: f64,
}

impl MagnitudeScale {
    /// Pick the factor for the largest absolute quantity in the frame.
    pub fn detect(max_abs: f64) -> Self {
        let factor = if max_abs > HARD_LIMIT {
            1e6
        } else if max_abs > SOFT_LIMIT {
            1e3
        } else {
            1.0
        };
        if factor != 1.0 {
            info!(max_abs, factor, "magnitude scaling engaged");
        }
        Self { factor }
    }

    pub fn identity() -> Self {
        Self { factor: 1.0 }
    }

    /// Rebuild a scale from a factor recorded in a package or model.
    pub fn from_factor(factor: f64) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn is_identity(&self) -> bool {
        self.factor == 1.0
    }

    /// Scale a quantity down for training.
    pub fn apply(&self, value: f64) -> f64 {
        value / self.factor
    }

    /// Scale a forecast output back up.
    pub fn invert(&self, value: f64) -> f64 {
        value * self.factor
    }

    pub fn invert_all(&self, values: &mut [f64]) {
        if self.is_identity() {
            return;
        }
        for v in values {
            *v = self.invert(*v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_thresholds() {
        assert_eq!(MagnitudeScale::detect(100.0).factor(), 1.0);
        assert_eq!(MagnitudeScale::detect(1e4).factor(), 1.0);
        assert_eq!(MagnitudeScale::detect(5e4).factor(), 1e3);
        assert_eq!(MagnitudeScale::detect(1e6).factor(), 1e3);
        assert_eq!(MagnitudeScale::detect(1e8).factor(), 1e6);
    }

    #[test]
    fn test_round_trip() {
        let scale = MagnitudeScale::detect(2e8);
        let scaled = scale.apply(1.5e8);
        assert_eq!(scaled, 150.0);
        assert_eq!(scale.invert(scaled), 1.5e8);
    }

    #[test]
    fn test_invert_all() {
        let scale = MagnitudeScale::detect(5e4);
        let mut values = vec![1.0, 2.0];
        scale.invert_all(&mut values);
        assert_eq!(values, vec![1e3, 2e3]);
    }
}
