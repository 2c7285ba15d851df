//! Nearest-neighbour classifier over stored exemplar patches.

use std::collections::VecDeque;

use tld_core::NormalizedPatch;

use crate::error::DetectorError;
use crate::params::{ExemplarEviction, NnParams};

/// Bounded collection of exemplar patches.
#[derive(Clone, Debug)]
pub struct ExemplarSet {
    capacity: usize,
    eviction: ExemplarEviction,
    patches: VecDeque<NormalizedPatch>,
}

impl ExemplarSet {
    pub fn new(capacity: usize, eviction: ExemplarEviction) -> Self {
        Self {
            capacity,
            eviction,
            patches: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Store `patch`, applying the eviction policy when full.
    ///
    /// Returns whether the patch was stored.
    pub fn push(&mut self, patch: NormalizedPatch) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.patches.len() >= self.capacity {
            match self.eviction {
                ExemplarEviction::DropOldest => {
                    self.patches.pop_front();
                }
                ExemplarEviction::KeepExisting => return false,
            }
        }
        self.patches.push_back(patch);
        true
    }

    /// Highest similarity of `patch` to any stored exemplar, 0 when empty.
    pub fn max_similarity(&self, patch: &NormalizedPatch) -> f32 {
        self.patches
            .iter()
            .map(|e| e.similarity(patch))
            .fold(0.0, f32::max)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored patches, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedPatch> {
        self.patches.iter()
    }

    pub fn clear(&mut self) {
        self.patches.clear();
    }
}

/// Counts of exemplars added by one [`NnClassifier::learn`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NnLearnOutcome {
    pub positives: usize,
    pub negatives: usize,
}

#[derive(Clone, Debug)]
pub struct NnClassifier {
    theta_p: f32,
    theta_n: f32,
    patch_size: usize,
    positives: ExemplarSet,
    negatives: ExemplarSet,
}

impl NnClassifier {
    pub fn new(params: &NnParams, patch_size: usize) -> Self {
        Self {
            theta_p: params.theta_p,
            theta_n: params.theta_n,
            patch_size,
            positives: ExemplarSet::new(params.max_positive, params.eviction),
            negatives: ExemplarSet::new(params.max_negative, params.eviction),
        }
    }

    /// Restore a classifier from stored exemplars (oldest first).
    pub fn from_exemplars(
        params: &NnParams,
        patch_size: usize,
        positives: Vec<NormalizedPatch>,
        negatives: Vec<NormalizedPatch>,
    ) -> Result<Self, DetectorError> {
        let mut nn = Self::new(params, patch_size);
        for (set, patches) in [(&mut nn.positives, positives), (&mut nn.negatives, negatives)] {
            if patches.len() > set.capacity {
                return Err(DetectorError::Capacity {
                    capacity: set.capacity,
                    got: patches.len(),
                });
            }
            for p in patches {
                if p.size() != patch_size {
                    return Err(DetectorError::PatchSize {
                        expected: patch_size,
                        got: p.size(),
                    });
                }
                set.push(p);
            }
        }
        Ok(nn)
    }

    pub fn theta_p(&self) -> f32 {
        self.theta_p
    }

    pub fn theta_n(&self) -> f32 {
        self.theta_n
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn positives(&self) -> &ExemplarSet {
        &self.positives
    }

    pub fn negatives(&self) -> &ExemplarSet {
        &self.negatives
    }

    /// `S+ / (S+ + S-)` against the nearest exemplar of each set.
    ///
    /// Defined as 0 when both similarities are 0, e.g. with empty sets.
    pub fn relative_similarity(&self, patch: &NormalizedPatch) -> f32 {
        let sp = self.positives.max_similarity(patch);
        let sn = self.negatives.max_similarity(patch);
        let denom = sp + sn;
        if denom <= 0.0 {
            0.0
        } else {
            sp / denom
        }
    }

    pub fn accepts(&self, confidence: f32) -> bool {
        confidence >= self.theta_p
    }

    /// Learn labelled patches in order.
    ///
    /// A positive is stored while the classifier is not yet confident about
    /// it (`conf <= theta_p`); a negative while it still looks object-like
    /// (`conf >= theta_n`). Later examples see the effect of earlier ones.
    pub fn learn<I>(&mut self, examples: I) -> NnLearnOutcome
    where
        I: IntoIterator<Item = (NormalizedPatch, bool)>,
    {
        let mut outcome = NnLearnOutcome::default();
        for (patch, positive) in examples {
            let conf = self.relative_similarity(&patch);
            if positive && conf <= self.theta_p {
                if self.positives.push(patch) {
                    outcome.positives += 1;
                }
            } else if !positive && conf >= self.theta_n && self.negatives.push(patch) {
                outcome.negatives += 1;
            }
        }
        outcome
    }

    pub fn clear(&mut self) {
        self.positives.clear();
        self.negatives.clear();
    }
}
