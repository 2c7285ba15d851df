//! Median-flow bounding box tracker.
//!
//! A regular grid of points inside the previous box is tracked forward and
//! back with pyramidal Lucas-Kanade. Points with above-median
//! forward-backward error or below-median patch correlation are dropped; the
//! rest vote for the box translation (median displacement) and scale
//! (median ratio of pairwise distances).

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tld_core::{GrayImageView, NormalizedPatch, Rect};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::lk::{track_point, LkParams};
use crate::pyramid::{FloatImage, Pyramid};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedianFlowParams {
    /// Points per side of the tracking grid.
    pub grid_points: usize,
    /// Inset of the grid from the box border, in pixels.
    pub margin: f32,
    /// Side of the correlation window around each point.
    pub ncc_window: usize,
    /// Tracking fails when the median forward-backward error exceeds this.
    pub max_fb_error: f32,
    /// Tracking fails when fewer inliers remain.
    pub min_points: usize,
    pub lk: LkParams,
}

impl Default for MedianFlowParams {
    fn default() -> Self {
        Self {
            grid_points: 10,
            margin: 5.0,
            ncc_window: 10,
            max_fb_error: 10.0,
            min_points: 2,
            lk: LkParams::default(),
        }
    }
}

/// Diagnostics of one tracking step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStats {
    /// Grid points laid into the box.
    pub points: usize,
    /// Points tracked forward and back.
    pub tracked: usize,
    /// Points surviving the median filters.
    pub inliers: usize,
    pub median_fb_error: f32,
    pub median_ncc: f32,
    pub scale: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackResult {
    /// Propagated box, `None` when tracking failed.
    pub bbox: Option<Rect>,
    pub stats: FlowStats,
}

impl TrackResult {
    pub fn is_valid(&self) -> bool {
        self.bbox.is_some()
    }

    fn failed(stats: FlowStats) -> Self {
        Self { bbox: None, stats }
    }
}

struct PointTrack {
    start: Point2<f32>,
    end: Point2<f32>,
    fb_error: f32,
    ncc: f32,
}

/// Median of a slice; reorders it. Mean of the middle pair for even lengths.
fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    })
}

/// Evenly spaced `n x n` points inside `rect`, inset by `margin`.
fn grid_points(rect: &Rect, n: usize, margin: f32) -> Vec<Point2<f32>> {
    let x0 = rect.x as f32 + margin;
    let y0 = rect.y as f32 + margin;
    let x1 = rect.right().saturating_sub(1) as f32 - margin;
    let y1 = rect.bottom().saturating_sub(1) as f32 - margin;
    let step = |lo: f32, hi: f32| {
        if n > 1 {
            (hi - lo) / (n - 1) as f32
        } else {
            0.0
        }
    };
    let (sx, sy) = (step(x0, x1), step(y0, y1));
    let mut out = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            out.push(Point2::new(x0 + i as f32 * sx, y0 + j as f32 * sy));
        }
    }
    out
}

fn window_patch(img: &FloatImage, c: Point2<f32>, size: usize) -> Option<NormalizedPatch> {
    let off = 0.5 * (size as f32 - 1.0);
    let mut samples = Vec::with_capacity(size * size);
    for j in 0..size {
        for i in 0..size {
            samples.push(img.sample(c.x - off + i as f32, c.y - off + j as f32));
        }
    }
    NormalizedPatch::from_samples(size, samples).ok()
}

/// Frame-to-frame tracker holding the pyramid of the last frame it saw.
#[derive(Clone, Debug)]
pub struct MedianFlowTracker {
    params: MedianFlowParams,
    previous: Option<Pyramid>,
}

impl MedianFlowTracker {
    pub fn new(params: MedianFlowParams) -> Self {
        Self {
            params,
            previous: None,
        }
    }

    pub fn params(&self) -> &MedianFlowParams {
        &self.params
    }

    fn pyramid(&self, frame: &GrayImageView<'_>) -> Pyramid {
        Pyramid::new(frame, self.params.lk.levels, self.params.lk.window)
    }

    /// Remember `frame` as the reference for the next [`track`](Self::track).
    pub fn set_reference(&mut self, frame: &GrayImageView<'_>) {
        self.previous = Some(self.pyramid(frame));
    }

    pub fn has_reference(&self) -> bool {
        self.previous.is_some()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Track `previous_box` from the reference frame into `frame`.
    ///
    /// `frame` becomes the new reference whatever the outcome. Without a box
    /// or a reference the result is invalid.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(width = frame.width, height = frame.height))
    )]
    pub fn track(&mut self, frame: &GrayImageView<'_>, previous_box: Option<&Rect>) -> TrackResult {
        let next = self.pyramid(frame);
        let prev = self.previous.replace(next);
        let (Some(prev), Some(bbox), Some(next)) = (prev, previous_box, self.previous.as_ref())
        else {
            return TrackResult::failed(FlowStats::default());
        };
        if bbox.is_degenerate() || prev.size() != next.size() {
            return TrackResult::failed(FlowStats::default());
        }
        self.track_box(&prev, next, bbox)
    }

    fn track_point_pair(&self, prev: &Pyramid, next: &Pyramid, p: Point2<f32>) -> Option<PointTrack> {
        let lk = &self.params.lk;
        let q = track_point(prev, next, p, lk)?;
        let back = track_point(next, prev, q, lk)?;
        let a = window_patch(&prev.levels()[0].image, p, self.params.ncc_window)?;
        let b = window_patch(&next.levels()[0].image, q, self.params.ncc_window)?;
        Some(PointTrack {
            start: p,
            end: q,
            fb_error: (back - p).norm(),
            ncc: a.ncc(&b),
        })
    }

    fn track_box(&self, prev: &Pyramid, next: &Pyramid, bbox: &Rect) -> TrackResult {
        let points = grid_points(bbox, self.params.grid_points, self.params.margin);
        let mut stats = FlowStats {
            points: points.len(),
            ..FlowStats::default()
        };

        #[cfg(feature = "rayon")]
        let tracks: Vec<Option<PointTrack>> = points
            .par_iter()
            .map(|&p| self.track_point_pair(prev, next, p))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let tracks: Vec<Option<PointTrack>> = points
            .iter()
            .map(|&p| self.track_point_pair(prev, next, p))
            .collect();

        let tracks: Vec<PointTrack> = tracks.into_iter().flatten().collect();
        stats.tracked = tracks.len();

        let mut fb: Vec<f32> = tracks.iter().map(|t| t.fb_error).collect();
        let mut ncc: Vec<f32> = tracks.iter().map(|t| t.ncc).collect();
        let (Some(med_fb), Some(med_ncc)) = (median(&mut fb), median(&mut ncc)) else {
            log::debug!("median flow: no point survived forward-backward tracking");
            return TrackResult::failed(stats);
        };
        stats.median_fb_error = med_fb;
        stats.median_ncc = med_ncc;

        let inliers: Vec<&PointTrack> = tracks
            .iter()
            .filter(|t| t.fb_error <= med_fb && t.ncc >= med_ncc)
            .collect();
        stats.inliers = inliers.len();
        if inliers.len() < self.params.min_points.max(1) || med_fb > self.params.max_fb_error {
            log::debug!(
                "median flow: {} inliers, median fb {:.2}, giving up",
                inliers.len(),
                med_fb
            );
            return TrackResult::failed(stats);
        }

        let mut dx: Vec<f32> = inliers.iter().map(|t| t.end.x - t.start.x).collect();
        let mut dy: Vec<f32> = inliers.iter().map(|t| t.end.y - t.start.y).collect();
        let mut ratios = Vec::with_capacity(inliers.len() * (inliers.len() - 1) / 2);
        for (i, a) in inliers.iter().enumerate() {
            for b in &inliers[i + 1..] {
                let before = (a.start - b.start).norm();
                if before > 0.0 {
                    ratios.push((a.end - b.end).norm() / before);
                }
            }
        }
        let (Some(dx), Some(dy)) = (median(&mut dx), median(&mut dy)) else {
            return TrackResult::failed(stats);
        };
        let scale = median(&mut ratios).unwrap_or(1.0);
        stats.scale = scale;

        let sw = 0.5 * (scale - 1.0) * bbox.width as f32;
        let sh = 0.5 * (scale - 1.0) * bbox.height as f32;
        let x0 = bbox.x as f32 - sw + dx;
        let y0 = bbox.y as f32 - sh + dy;
        let x1 = bbox.right().saturating_sub(1) as f32 + sw + dx;
        let y1 = bbox.bottom().saturating_sub(1) as f32 + sh + dy;
        let round = |v: f32| (v + 0.5).floor();
        let candidate = Rect::from_f32(
            round(x0),
            round(y0),
            round(x1 - x0 + 1.0),
            round(y1 - y0 + 1.0),
        );
        let (w, h) = next.size();
        match candidate {
            Some(r) if r.is_inside(w, h) => TrackResult {
                bbox: Some(r),
                stats,
            },
            _ => {
                log::debug!("median flow: propagated box {candidate:?} left the frame");
                TrackResult::failed(stats)
            }
        }
    }
}
