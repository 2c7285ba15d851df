//! Tracker configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tld_detector::{DetectorError, DetectorParams};
use tld_tracker::MedianFlowParams;

use crate::io::{load_json, write_json, TldIoError};

/// P-N learning knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningParams {
    /// Learn from tracker output at all.
    pub enabled: bool,
    /// Learn only on every other valid frame.
    pub alternating: bool,
    /// Windows overlapping the object more than this are positives.
    pub positive_overlap: f32,
    /// Windows overlapping the object less than this are negatives.
    pub negative_overlap: f32,
    /// Best-overlapping positive windows used to train the ferns.
    pub max_positive_windows: usize,
    /// Negative exemplars drawn when an object is selected.
    pub max_initial_negatives: usize,
    /// Negative windows train the ferns only above this posterior.
    pub ensemble_negative_posterior: f32,
    /// Seed of the negative-window shuffle on selection.
    pub shuffle_seed: u64,
}

impl Default for LearningParams {
    fn default() -> Self {
        Self {
            enabled: true,
            alternating: false,
            positive_overlap: 0.6,
            negative_overlap: 0.2,
            max_positive_windows: 10,
            max_initial_negatives: 100,
            ensemble_negative_posterior: 0.1,
            shuffle_seed: 1,
        }
    }
}

/// How tracker and detector hypotheses are combined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// A single more confident detection overlapping the tracker box less
    /// than this replaces it.
    pub confusion_overlap: f32,
    /// Detections overlapping the tracker box more than this may be averaged in.
    pub reacquire_overlap: f32,
    /// Weight of the tracker box when averaging.
    pub tracker_weight: f32,
    pub average_with_detections: bool,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            confusion_overlap: 0.5,
            reacquire_overlap: 0.7,
            tracker_weight: 10.0,
            average_with_detections: false,
        }
    }
}

/// Complete configuration of a [`Tld`](crate::Tld) instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TldConfig {
    pub detector: DetectorParams,
    pub tracker: MedianFlowParams,
    pub learning: LearningParams,
    pub fusion: FusionParams,
    /// Confidence above which callers should trust a frame result.
    /// Not used by the tracker itself.
    pub acceptance_threshold: f32,
}

impl Default for TldConfig {
    fn default() -> Self {
        Self {
            detector: DetectorParams::default(),
            tracker: MedianFlowParams::default(),
            learning: LearningParams::default(),
            fusion: FusionParams::default(),
            acceptance_threshold: 0.7,
        }
    }
}

impl TldConfig {
    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TldIoError> {
        load_json(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TldIoError> {
        write_json(path, self)
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        self.detector.validate()?;
        let l = &self.learning;
        if !(0.0..=1.0).contains(&l.positive_overlap) || !(0.0..=1.0).contains(&l.negative_overlap)
        {
            return Err(DetectorError::InvalidParams(
                "learning overlaps must lie in [0, 1]".to_string(),
            ));
        }
        if self.tracker.grid_points == 0 || self.tracker.lk.window % 2 == 0 {
            return Err(DetectorError::InvalidParams(
                "tracker needs grid points and an odd LK window".to_string(),
            ));
        }
        Ok(())
    }
}
