//! P-N learning: seeding the model on selection and updating it from
//! validated frames.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tld_core::{GrayImageView, IntegralImage, NormalizedPatch, Rect};
use tld_detector::{DetectionResult, DetectorCascade, VarianceFilter};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::LearningParams;
use crate::error::TldError;

/// What one learning pass changed in the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningReport {
    /// Fern updates from object-like windows.
    pub ensemble_positives: usize,
    /// Fern updates from background windows.
    pub ensemble_negatives: usize,
    pub nn_positives: usize,
    pub nn_negatives: usize,
}

impl LearningReport {
    pub fn changed(&self) -> bool {
        self.ensemble_positives
            + self.ensemble_negatives
            + self.nn_positives
            + self.nn_negatives
            > 0
    }
}

/// Indices of windows overlapping `rect` more than `min_overlap`, best first.
fn best_positive_windows(overlaps: &[f32], min_overlap: f32, limit: usize) -> Vec<usize> {
    let mut positives: Vec<usize> = (0..overlaps.len())
        .filter(|&i| overlaps[i] > min_overlap)
        .collect();
    // stable: ties keep scan order
    positives.sort_by(|&a, &b| overlaps[b].total_cmp(&overlaps[a]));
    positives.truncate(limit);
    positives
}

/// Train the ferns on the best windows around `rect` as positives.
fn train_positive_windows(
    cascade: &mut DetectorCascade,
    frame: &GrayImageView<'_>,
    overlaps: &[f32],
    params: &LearningParams,
) -> usize {
    let picked = best_positive_windows(
        overlaps,
        params.positive_overlap,
        params.max_positive_windows,
    );
    let mut updated = 0;
    for i in picked {
        let window = cascade.grid().windows()[i];
        let codes = cascade.ensemble().codes(frame, &window);
        if cascade.ensemble_mut().learn(&codes, true) {
            updated += 1;
        }
    }
    updated
}

/// Seed a freshly built cascade from the selected object.
///
/// Sets the variance threshold from the selected patch, trains the ferns on
/// the windows that best cover the object and fills the NN store with the
/// object patch plus a seeded random sample of textured background windows.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cascade, frame, params), fields(rect = ?rect))
)]
pub fn initial_learning(
    cascade: &mut DetectorCascade,
    frame: &GrayImageView<'_>,
    rect: &Rect,
    params: &LearningParams,
) -> Result<LearningReport, TldError> {
    let object = cascade.patch(frame, rect)?;
    let filter = VarianceFilter::from_object_variance(
        object.variance(),
        cascade.params().variance_fraction,
    );
    let min_variance = filter.min_variance();
    cascade.set_variance_filter(filter);

    let overlaps = cascade.grid().overlaps(rect);
    let mut report = LearningReport {
        ensemble_positives: train_positive_windows(cascade, frame, &overlaps, params),
        ..LearningReport::default()
    };

    let integral = IntegralImage::new(frame);
    let mut candidates: Vec<usize> = cascade
        .grid()
        .windows()
        .iter()
        .enumerate()
        .filter(|(i, w)| {
            overlaps[*i] < params.negative_overlap
                && integral
                    .variance(&w.rect)
                    .is_some_and(|v| v > min_variance)
        })
        .map(|(i, _)| i)
        .collect();
    let mut rng = StdRng::seed_from_u64(params.shuffle_seed);
    candidates.shuffle(&mut rng);

    let mut negatives = Vec::with_capacity(params.max_initial_negatives);
    for i in candidates {
        if negatives.len() >= params.max_initial_negatives {
            break;
        }
        let rect = cascade.grid().windows()[i].rect;
        let Ok(patch) = cascade.patch(frame, &rect) else {
            continue;
        };
        if !patch.is_flat() && patch.variance() > min_variance {
            negatives.push(patch);
        }
    }
    log::debug!(
        "initial learning: min variance {:.2}, {} fern positives, {} negative candidates",
        min_variance,
        report.ensemble_positives,
        negatives.len()
    );

    let examples = std::iter::once((object, true)).chain(negatives.into_iter().map(|p| (p, false)));
    let nn = cascade.nn_mut().learn(examples);
    report.nn_positives = nn.positives;
    report.nn_negatives = nn.negatives;
    Ok(report)
}

/// Update the model from a frame whose output box was validated.
///
/// Background windows the ferns still score above
/// `ensemble_negative_posterior` are learned as fern negatives before the
/// best windows around `rect` are learned as positives. The NN then learns
/// the output patch and every background window that passed the ferns.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cascade, frame, detection, params), fields(rect = ?rect))
)]
pub fn learn_frame(
    cascade: &mut DetectorCascade,
    frame: &GrayImageView<'_>,
    rect: &Rect,
    detection: &DetectionResult,
    params: &LearningParams,
) -> Result<LearningReport, TldError> {
    let object = cascade.patch(frame, rect)?;
    let overlaps = cascade.grid().overlaps(rect);
    let mut report = LearningReport::default();

    let background: Vec<usize> = (0..overlaps.len())
        .filter(|&i| overlaps[i] < params.negative_overlap)
        .collect();

    for &i in &background {
        if detection.posteriors[i] > params.ensemble_negative_posterior {
            let window = cascade.grid().windows()[i];
            let codes = cascade.ensemble().codes(frame, &window);
            if cascade.ensemble_mut().learn(&codes, false) {
                report.ensemble_negatives += 1;
            }
        }
    }
    report.ensemble_positives = train_positive_windows(cascade, frame, &overlaps, params);

    let mut negatives: Vec<NormalizedPatch> = Vec::new();
    for &i in &background {
        if detection.verdicts[i].passed_ensemble() {
            let rect = cascade.grid().windows()[i].rect;
            if let Ok(patch) = cascade.patch(frame, &rect) {
                negatives.push(patch);
            }
        }
    }

    let examples = std::iter::once((object, true)).chain(negatives.into_iter().map(|p| (p, false)));
    let nn = cascade.nn_mut().learn(examples);
    report.nn_positives = nn.positives;
    report.nn_negatives = nn.negatives;
    log::debug!("learned from {rect:?}: {report:?}");
    Ok(report)
}
