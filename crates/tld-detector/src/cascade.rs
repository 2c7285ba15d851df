//! The detector cascade: variance filter, fern ensemble and NN classifier
//! applied to every window of the grid, short-circuiting per window.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tld_core::{GrayImageView, IntegralImage, NormalizedPatch, Rect};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::cluster::{cluster_detections, Cluster, Detection};
use crate::ensemble::FernEnsemble;
use crate::error::DetectorError;
use crate::nn::NnClassifier;
use crate::params::DetectorParams;
use crate::variance::VarianceFilter;
use crate::windows::{CandidateWindow, WindowGrid};

/// Cascade stage that rejected a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Variance,
    Ensemble,
    NearestNeighbor,
}

/// Outcome of running one window through the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    /// Passed every stage with this NN relative similarity.
    Accepted(f32),
    RejectedAt(Stage),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// True when the window reached the NN stage.
    pub fn passed_ensemble(&self) -> bool {
        matches!(
            self,
            Verdict::Accepted(_) | Verdict::RejectedAt(Stage::NearestNeighbor)
        )
    }
}

/// Per-frame cascade counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStats {
    pub windows: usize,
    pub variance_rejected: usize,
    pub ensemble_rejected: usize,
    pub nn_rejected: usize,
    pub accepted: usize,
    pub clusters: usize,
}

/// Number of times each stage was evaluated since the last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageCalls {
    pub variance: usize,
    pub ensemble: usize,
    pub nn: usize,
}

#[derive(Debug, Default)]
struct StageCounters {
    variance: AtomicUsize,
    ensemble: AtomicUsize,
    nn: AtomicUsize,
}

/// Everything the cascade learned about one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Verdict per window, in grid order.
    pub verdicts: Vec<Verdict>,
    /// Ensemble confidence per window; 0 for windows rejected by variance.
    pub posteriors: Vec<f32>,
    /// Accepted windows in grid order.
    pub detections: Vec<Detection>,
    pub clusters: Vec<Cluster>,
    pub stats: CascadeStats,
}

/// Detector for one object size and frame size.
#[derive(Debug)]
pub struct DetectorCascade {
    params: DetectorParams,
    grid: WindowGrid,
    variance: VarianceFilter,
    ensemble: FernEnsemble,
    nn: NnClassifier,
    counters: StageCounters,
}

impl DetectorCascade {
    /// Build the window grid and an untrained model.
    pub fn new(
        frame_width: usize,
        frame_height: usize,
        object_width: i32,
        object_height: i32,
        params: DetectorParams,
    ) -> Result<Self, DetectorError> {
        params.validate()?;
        let grid = WindowGrid::new(
            frame_width,
            frame_height,
            object_width,
            object_height,
            &params.grid,
        );
        let ensemble = FernEnsemble::new(&params.ensemble, grid.scales());
        let nn = NnClassifier::new(&params.nn, params.patch_size);
        Ok(Self {
            params,
            grid,
            variance: VarianceFilter::default(),
            ensemble,
            nn,
            counters: StageCounters::default(),
        })
    }

    /// Assemble a cascade from restored parts. The grid must match `ensemble`.
    pub fn from_parts(
        params: DetectorParams,
        grid: WindowGrid,
        variance: VarianceFilter,
        ensemble: FernEnsemble,
        nn: NnClassifier,
    ) -> Self {
        Self {
            params,
            grid,
            variance,
            ensemble,
            nn,
            counters: StageCounters::default(),
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn grid(&self) -> &WindowGrid {
        &self.grid
    }

    pub fn variance_filter(&self) -> &VarianceFilter {
        &self.variance
    }

    pub fn set_variance_filter(&mut self, filter: VarianceFilter) {
        self.variance = filter;
    }

    pub fn ensemble(&self) -> &FernEnsemble {
        &self.ensemble
    }

    pub fn ensemble_mut(&mut self) -> &mut FernEnsemble {
        &mut self.ensemble
    }

    pub fn nn(&self) -> &NnClassifier {
        &self.nn
    }

    pub fn nn_mut(&mut self) -> &mut NnClassifier {
        &mut self.nn
    }

    pub fn stage_calls(&self) -> StageCalls {
        StageCalls {
            variance: self.counters.variance.load(Ordering::Relaxed),
            ensemble: self.counters.ensemble.load(Ordering::Relaxed),
            nn: self.counters.nn.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stage_calls(&self) {
        self.counters.variance.store(0, Ordering::Relaxed);
        self.counters.ensemble.store(0, Ordering::Relaxed);
        self.counters.nn.store(0, Ordering::Relaxed);
    }

    /// Normalized patch of `rect` at the NN patch size.
    pub fn patch(
        &self,
        frame: &GrayImageView<'_>,
        rect: &Rect,
    ) -> Result<NormalizedPatch, tld_core::PatchError> {
        NormalizedPatch::from_region(frame, rect, self.params.patch_size)
    }

    /// NN relative similarity of an arbitrary box.
    pub fn nn_confidence(&self, frame: &GrayImageView<'_>, rect: &Rect) -> f32 {
        match self.patch(frame, rect) {
            Ok(p) => self.nn.relative_similarity(&p),
            Err(_) => 0.0,
        }
    }

    fn classify_window(
        &self,
        frame: &GrayImageView<'_>,
        integral: &IntegralImage,
        window: &CandidateWindow,
    ) -> (Verdict, f32) {
        self.counters.variance.fetch_add(1, Ordering::Relaxed);
        if !self.variance.accepts(integral, &window.rect) {
            return (Verdict::RejectedAt(Stage::Variance), 0.0);
        }

        self.counters.ensemble.fetch_add(1, Ordering::Relaxed);
        let posterior = self.ensemble.classify(frame, window);
        if !self.ensemble.accepts(posterior) {
            return (Verdict::RejectedAt(Stage::Ensemble), posterior);
        }

        self.counters.nn.fetch_add(1, Ordering::Relaxed);
        let conf = self.nn_confidence(frame, &window.rect);
        if !self.nn.accepts(conf) {
            return (Verdict::RejectedAt(Stage::NearestNeighbor), posterior);
        }
        (Verdict::Accepted(conf), posterior)
    }

    /// Classify every window of `frame` and cluster the survivors.
    ///
    /// Windows are independent; results are gathered in grid order so the
    /// output does not depend on scheduling.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(windows = self.grid.len()))
    )]
    pub fn detect(&self, frame: &GrayImageView<'_>) -> DetectionResult {
        let integral = IntegralImage::new(frame);
        let windows = self.grid.windows();

        #[cfg(feature = "rayon")]
        let scored: Vec<(Verdict, f32)> = windows
            .par_iter()
            .map(|w| self.classify_window(frame, &integral, w))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let scored: Vec<(Verdict, f32)> = windows
            .iter()
            .map(|w| self.classify_window(frame, &integral, w))
            .collect();

        let mut stats = CascadeStats {
            windows: windows.len(),
            ..CascadeStats::default()
        };
        let mut verdicts = Vec::with_capacity(scored.len());
        let mut posteriors = Vec::with_capacity(scored.len());
        let mut detections = Vec::new();
        for (i, (verdict, posterior)) in scored.into_iter().enumerate() {
            match verdict {
                Verdict::Accepted(confidence) => {
                    stats.accepted += 1;
                    detections.push(Detection {
                        window_index: i,
                        rect: windows[i].rect,
                        confidence,
                    });
                }
                Verdict::RejectedAt(Stage::Variance) => stats.variance_rejected += 1,
                Verdict::RejectedAt(Stage::Ensemble) => stats.ensemble_rejected += 1,
                Verdict::RejectedAt(Stage::NearestNeighbor) => stats.nn_rejected += 1,
            }
            verdicts.push(verdict);
            posteriors.push(posterior);
        }

        let clusters = cluster_detections(&detections, self.params.cluster_overlap);
        stats.clusters = clusters.len();
        log::debug!(
            "cascade: {} windows, rejected var/ens/nn = {}/{}/{}, {} accepted in {} clusters",
            stats.windows,
            stats.variance_rejected,
            stats.ensemble_rejected,
            stats.nn_rejected,
            stats.accepted,
            stats.clusters
        );

        DetectionResult {
            verdicts,
            posteriors,
            detections,
            clusters,
            stats,
        }
    }
}
