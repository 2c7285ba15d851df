//! Sliding-window object detector of the TLD tracker.
//!
//! [`DetectorCascade::detect`] scans every [`CandidateWindow`] of a frame
//! through three stages of increasing cost:
//!
//! 1. [`VarianceFilter`] on integral images,
//! 2. the random-fern [`FernEnsemble`],
//! 3. the nearest-neighbour [`NnClassifier`] on normalized patches.
//!
//! A window rejected by one stage never reaches the next. Accepted windows
//! are merged by [`cluster_detections`].

mod cascade;
mod cluster;
mod ensemble;
mod error;
mod nn;
mod params;
mod variance;
mod windows;

pub use cascade::{
    CascadeStats, DetectionResult, DetectorCascade, Stage, StageCalls, Verdict,
};
pub use cluster::{cluster_detections, Cluster, Detection};
pub use ensemble::{FernEnsemble, FernTables};
pub use error::DetectorError;
pub use nn::{ExemplarSet, NnClassifier, NnLearnOutcome};
pub use params::{
    DetectorParams, EnsembleParams, ExemplarEviction, NnParams, WindowGridParams,
    MAX_FERN_FEATURES,
};
pub use variance::VarianceFilter;
pub use windows::{CandidateWindow, WindowGrid};
