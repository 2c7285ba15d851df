//! Combination of the tracked box with detector clusters.

use tld_core::{mean_rect, Rect};

use crate::config::FusionParams;
use crate::state::OutputSource;

/// A scored box from either the tracker or the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Hypothesis {
    pub rect: Rect,
    pub confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Fused {
    pub bbox: Option<Rect>,
    pub confidence: f32,
    /// The box came from a confident tracker and may be learned from.
    pub valid: bool,
    pub source: OutputSource,
}

impl Fused {
    fn none() -> Self {
        Self {
            bbox: None,
            confidence: 0.0,
            valid: false,
            source: OutputSource::None,
        }
    }

    fn detector(h: &Hypothesis) -> Self {
        Self {
            bbox: Some(h.rect),
            confidence: h.confidence,
            valid: false,
            source: OutputSource::Detector,
        }
    }
}

pub(crate) struct FusionThresholds {
    pub theta_p: f32,
    pub theta_n: f32,
}

pub(crate) fn fuse(
    tracker: Option<Hypothesis>,
    clusters: &[Hypothesis],
    was_valid: bool,
    thresholds: &FusionThresholds,
    params: &FusionParams,
) -> Fused {
    let confident = |t: &Hypothesis| {
        t.confidence >= thresholds.theta_p || (was_valid && t.confidence >= thresholds.theta_n)
    };

    match tracker {
        Some(t) if confident(&t) => {
            if let [only] = clusters {
                if only.confidence > t.confidence
                    && only.rect.overlap(&t.rect) < params.confusion_overlap
                {
                    return Fused::detector(only);
                }
            }
            let mut rect = t.rect;
            if params.average_with_detections {
                let close: Vec<&Hypothesis> = clusters
                    .iter()
                    .filter(|c| c.rect.overlap(&t.rect) > params.reacquire_overlap)
                    .collect();
                if !close.is_empty() {
                    let weighted = std::iter::once((&t.rect, params.tracker_weight))
                        .chain(close.iter().map(|c| (&c.rect, 1.0)));
                    rect = mean_rect(weighted).unwrap_or(t.rect);
                }
            }
            Fused {
                bbox: Some(rect),
                confidence: t.confidence,
                valid: true,
                source: OutputSource::Tracker,
            }
        }
        _ => clusters
            .iter()
            .filter(|c| c.confidence >= thresholds.theta_p)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(Fused::detector)
            .unwrap_or_else(Fused::none),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: FusionThresholds = FusionThresholds {
        theta_p: 0.65,
        theta_n: 0.5,
    };

    fn h(x: i32, y: i32, confidence: f32) -> Hypothesis {
        Hypothesis {
            rect: Rect::new(x, y, 40, 40),
            confidence,
        }
    }

    #[test]
    fn confident_tracker_without_detections_wins() {
        let f = fuse(Some(h(10, 10, 0.8)), &[], false, &TH, &FusionParams::default());
        assert_eq!(f.bbox, Some(Rect::new(10, 10, 40, 40)));
        assert!(f.valid);
        assert_eq!(f.source, OutputSource::Tracker);
    }

    #[test]
    fn hysteresis_keeps_a_previously_valid_track() {
        let p = FusionParams::default();
        let weak = Some(h(10, 10, 0.55));
        assert!(fuse(weak, &[], true, &TH, &p).valid);
        let f = fuse(weak, &[], false, &TH, &p);
        assert_eq!(f.bbox, None);
        assert_eq!(f.source, OutputSource::None);
    }

    #[test]
    fn single_distant_stronger_detection_reinitializes() {
        let f = fuse(
            Some(h(10, 10, 0.7)),
            &[h(120, 120, 0.9)],
            true,
            &TH,
            &FusionParams::default(),
        );
        assert_eq!(f.bbox, Some(Rect::new(120, 120, 40, 40)));
        assert!(!f.valid);
        assert_eq!(f.source, OutputSource::Detector);
    }

    #[test]
    fn several_detections_do_not_override_the_tracker() {
        let f = fuse(
            Some(h(10, 10, 0.7)),
            &[h(120, 120, 0.9), h(0, 120, 0.95)],
            true,
            &TH,
            &FusionParams::default(),
        );
        assert_eq!(f.source, OutputSource::Tracker);
    }

    #[test]
    fn close_detections_are_averaged_when_enabled() {
        let p = FusionParams {
            average_with_detections: true,
            ..FusionParams::default()
        };
        let f = fuse(Some(h(0, 0, 0.8)), &[h(11, 0, 0.7), h(1, 0, 0.7)], true, &TH, &p);
        // (10 * 0 + 1) / 11 rounds to 0; the distant cluster is ignored
        assert_eq!(f.bbox, Some(Rect::new(0, 0, 40, 40)));
        let f = fuse(Some(h(0, 0, 0.8)), &[h(6, 0, 0.7)], true, &TH, &p);
        assert_eq!(f.bbox, Some(Rect::new(1, 0, 40, 40)));
    }

    #[test]
    fn lost_tracker_falls_back_to_best_confident_cluster() {
        let p = FusionParams::default();
        let f = fuse(None, &[h(0, 0, 0.7), h(100, 0, 0.9), h(50, 50, 0.6)], false, &TH, &p);
        assert_eq!(f.bbox, Some(Rect::new(100, 0, 40, 40)));
        assert_eq!(f.confidence, 0.9);
        let f = fuse(None, &[h(0, 0, 0.6)], false, &TH, &p);
        assert_eq!(f.bbox, None);
    }
}
