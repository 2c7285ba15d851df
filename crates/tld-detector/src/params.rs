use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Largest supported number of comparisons per fern (table size `2^n`).
pub const MAX_FERN_FEATURES: usize = 20;

/// Scale pyramid and stride of the sliding-window grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowGridParams {
    /// Smallest scale exponent; window side is `object * scale_step^k`.
    pub min_scale: i32,
    pub max_scale: i32,
    pub scale_step: f32,
    /// Stride as a fraction of the window side, at least one pixel.
    pub shift: f32,
    /// Windows narrower or shorter than this are not generated.
    pub min_size: i32,
}

impl Default for WindowGridParams {
    fn default() -> Self {
        Self {
            min_scale: -10,
            max_scale: 10,
            scale_step: 1.2,
            shift: 0.1,
            min_size: 25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleParams {
    pub num_trees: usize,
    pub num_features: usize,
    /// A window passes when the average fern posterior reaches this value.
    pub threshold: f32,
    /// Seed for the pixel-pair comparisons.
    pub seed: u64,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            num_trees: 10,
            num_features: 10,
            threshold: 0.5,
            seed: 0x7_1d5e_ed,
        }
    }
}

/// What an exemplar set does once it reaches capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemplarEviction {
    /// Overwrite the oldest stored exemplar (FIFO ring buffer).
    #[default]
    DropOldest,
    /// Stop accepting new exemplars.
    KeepExisting,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NnParams {
    /// Relative similarity needed to accept a window as the object.
    pub theta_p: f32,
    /// Relative similarity above which a negative is still worth storing.
    pub theta_n: f32,
    pub max_positive: usize,
    pub max_negative: usize,
    pub eviction: ExemplarEviction,
}

impl Default for NnParams {
    fn default() -> Self {
        Self {
            theta_p: 0.65,
            theta_n: 0.5,
            max_positive: 500,
            max_negative: 500,
            eviction: ExemplarEviction::DropOldest,
        }
    }
}

/// Configuration of the full detector cascade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Side of the normalized patch used by the NN stage.
    pub patch_size: usize,
    /// Variance threshold as a fraction of the selected patch variance.
    pub variance_fraction: f64,
    pub grid: WindowGridParams,
    pub ensemble: EnsembleParams,
    pub nn: NnParams,
    /// Accepted windows overlapping at least this much share a cluster.
    pub cluster_overlap: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            patch_size: tld_core::DEFAULT_PATCH_SIZE,
            variance_fraction: 0.5,
            grid: WindowGridParams::default(),
            ensemble: EnsembleParams::default(),
            nn: NnParams::default(),
            cluster_overlap: 0.5,
        }
    }
}

impl DetectorParams {
    /// Reject configurations the cascade cannot be built from.
    pub fn validate(&self) -> Result<(), DetectorError> {
        let bad = |msg: &str| Err(DetectorError::InvalidParams(msg.to_string()));
        if self.patch_size == 0 {
            return bad("patch_size must be positive");
        }
        if self.ensemble.num_trees == 0 {
            return bad("ensemble.num_trees must be positive");
        }
        if self.ensemble.num_features == 0 || self.ensemble.num_features > MAX_FERN_FEATURES {
            return bad("ensemble.num_features must be in 1..=20");
        }
        if self.grid.min_scale > self.grid.max_scale {
            return bad("grid.min_scale exceeds grid.max_scale");
        }
        if !(self.grid.scale_step > 1.0) || !(self.grid.shift > 0.0) {
            return bad("grid.scale_step must exceed 1 and grid.shift must be positive");
        }
        if !(0.0..=1.0).contains(&self.nn.theta_n) || !(0.0..=1.0).contains(&self.nn.theta_p) {
            return bad("nn thresholds must lie in [0, 1]");
        }
        if !(self.variance_fraction >= 0.0) {
            return bad("variance_fraction must be non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let p: DetectorParams =
            serde_json::from_str(r#"{ "nn": { "theta_p": 0.7 }, "grid": { "min_size": 20 } }"#)
                .expect("parse");
        assert_eq!(p.nn.theta_p, 0.7);
        assert_eq!(p.nn.theta_n, 0.5);
        assert_eq!(p.grid.min_size, 20);
        assert_eq!(p.grid.max_scale, 10);
        assert_eq!(p.ensemble.num_trees, 10);
        assert_eq!(p.patch_size, 15);
    }

    #[test]
    fn defaults_validate_and_bad_values_do_not() {
        assert!(DetectorParams::default().validate().is_ok());
        let mut p = DetectorParams::default();
        p.ensemble.num_features = 32;
        assert!(matches!(p.validate(), Err(DetectorError::InvalidParams(_))));
        let mut p = DetectorParams::default();
        p.grid.min_scale = 3;
        p.grid.max_scale = 2;
        assert!(p.validate().is_err());
    }

    #[test]
    fn eviction_uses_snake_case() {
        let s = serde_json::to_string(&ExemplarEviction::KeepExisting).expect("json");
        assert_eq!(s, "\"keep_existing\"");
    }
}
