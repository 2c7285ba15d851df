//! Random-fern ensemble: the second cascade stage.
//!
//! Each fern compares `num_features` pixel pairs inside the window and turns
//! the outcomes into a leaf code. Leaves keep positive and negative hit
//! counters; the posterior of a leaf is `p / (p + n)` and the ensemble
//! confidence is the mean posterior over all ferns.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tld_core::GrayImageView;

use crate::error::DetectorError;
use crate::params::EnsembleParams;
use crate::windows::CandidateWindow;

/// Serializable fern state: comparison layout plus leaf counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FernTables {
    /// Relative pixel pairs `[x0, y0, x1, y1]` in `[0, 1]`, tree-major.
    pub features: Vec<[f32; 4]>,
    pub positives: Vec<u32>,
    pub negatives: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct FernEnsemble {
    num_trees: usize,
    num_features: usize,
    threshold: f32,
    features: Vec<[f32; 4]>,
    /// Pixel offsets per scale, `scale * trees * features + tree * features + feature`.
    offsets: Vec<[(i32, i32); 2]>,
    positives: Vec<u32>,
    negatives: Vec<u32>,
    posteriors: Vec<f32>,
}

impl FernEnsemble {
    /// Fresh ensemble with seeded comparisons and empty counters.
    pub fn new(params: &EnsembleParams, scales: &[(i32, i32)]) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let features = (0..params.num_trees * params.num_features)
            .map(|_| {
                [
                    rng.random::<f32>(),
                    rng.random::<f32>(),
                    rng.random::<f32>(),
                    rng.random::<f32>(),
                ]
            })
            .collect();
        let leaves = params.num_trees << params.num_features;
        Self::assemble(
            params,
            scales,
            FernTables {
                features,
                positives: vec![0; leaves],
                negatives: vec![0; leaves],
            },
        )
    }

    /// Restore an ensemble from stored tables, validating their shape.
    pub fn from_tables(
        params: &EnsembleParams,
        scales: &[(i32, i32)],
        tables: FernTables,
    ) -> Result<Self, DetectorError> {
        let expected_features = params.num_trees * params.num_features;
        if tables.features.len() != expected_features {
            return Err(DetectorError::FeatureCount {
                expected: expected_features,
                got: tables.features.len(),
            });
        }
        if let Some(bad) = tables
            .features
            .iter()
            .flatten()
            .find(|v| !(0.0..=1.0).contains(*v))
        {
            return Err(DetectorError::FeatureRange(*bad));
        }
        let leaves = params.num_trees << params.num_features;
        for got in [tables.positives.len(), tables.negatives.len()] {
            if got != leaves {
                return Err(DetectorError::TableSize {
                    expected: leaves,
                    got,
                });
            }
        }
        Ok(Self::assemble(params, scales, tables))
    }

    fn assemble(params: &EnsembleParams, scales: &[(i32, i32)], tables: FernTables) -> Self {
        let mut offsets = Vec::with_capacity(scales.len() * tables.features.len());
        for &(w, h) in scales {
            for f in &tables.features {
                offsets.push([
                    (((w - 1) as f32 * f[0]) as i32, ((h - 1) as f32 * f[1]) as i32),
                    (((w - 1) as f32 * f[2]) as i32, ((h - 1) as f32 * f[3]) as i32),
                ]);
            }
        }
        let posteriors = tables
            .positives
            .iter()
            .zip(&tables.negatives)
            .map(|(&p, &n)| leaf_posterior(p, n))
            .collect();
        Self {
            num_trees: params.num_trees,
            num_features: params.num_features,
            threshold: params.threshold,
            features: tables.features,
            offsets,
            positives: tables.positives,
            negatives: tables.negatives,
            posteriors,
        }
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn tables(&self) -> FernTables {
        FernTables {
            features: self.features.clone(),
            positives: self.positives.clone(),
            negatives: self.negatives.clone(),
        }
    }

    /// Leaf code of every fern for `window` in `frame`.
    pub fn codes(&self, frame: &GrayImageView<'_>, window: &CandidateWindow) -> Vec<u32> {
        let per_scale = self.num_trees * self.num_features;
        let base = window.scale_index * per_scale;
        let (x0, y0) = (window.rect.x, window.rect.y);
        let pixel = |(dx, dy): (i32, i32)| {
            let x = (x0 + dx).clamp(0, frame.width as i32 - 1) as usize;
            let y = (y0 + dy).clamp(0, frame.height as i32 - 1) as usize;
            frame.get(x, y)
        };
        (0..self.num_trees)
            .map(|t| {
                let fern = &self.offsets[base + t * self.num_features..][..self.num_features];
                fern.iter().fold(0u32, |code, &[a, b]| {
                    (code << 1) | u32::from(pixel(a) > pixel(b))
                })
            })
            .collect()
    }

    #[inline]
    fn leaf(&self, tree: usize, code: u32) -> usize {
        (tree << self.num_features) + code as usize
    }

    /// Mean posterior over all ferns.
    pub fn confidence(&self, codes: &[u32]) -> f32 {
        let sum: f32 = codes
            .iter()
            .enumerate()
            .map(|(t, &c)| self.posteriors[self.leaf(t, c)])
            .sum();
        sum / self.num_trees as f32
    }

    /// Codes and confidence in one go.
    pub fn classify(&self, frame: &GrayImageView<'_>, window: &CandidateWindow) -> f32 {
        self.confidence(&self.codes(frame, window))
    }

    pub fn accepts(&self, confidence: f32) -> bool {
        confidence >= self.threshold
    }

    /// Increment the counters of every fern unconditionally.
    pub fn train(&mut self, codes: &[u32], positive: bool) {
        for (t, &c) in codes.iter().enumerate() {
            let i = self.leaf(t, c);
            if positive {
                self.positives[i] = self.positives[i].saturating_add(1);
            } else {
                self.negatives[i] = self.negatives[i].saturating_add(1);
            }
            self.posteriors[i] = leaf_posterior(self.positives[i], self.negatives[i]);
        }
    }

    /// Train only when the current confidence disagrees with `positive`.
    ///
    /// Returns whether the counters changed.
    pub fn learn(&mut self, codes: &[u32], positive: bool) -> bool {
        let conf = self.confidence(codes);
        let wrong = (positive && conf < 0.5) || (!positive && conf > 0.5);
        if wrong {
            self.train(codes, positive);
        }
        wrong
    }
}

#[inline]
fn leaf_posterior(p: u32, n: u32) -> f32 {
    let total = p as u64 + n as u64;
    if total == 0 {
        0.0
    } else {
        (p as f64 / total as f64) as f32
    }
}
