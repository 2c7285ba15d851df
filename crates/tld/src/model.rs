//! Serialized detector model.
//!
//! The model is everything the detector learned: the variance threshold,
//! the fern tables and both exemplar sets, together with the configuration
//! and the frame/object sizes needed to rebuild the window grid.

use serde::{Deserialize, Serialize};
use tld_core::NormalizedPatch;
use tld_detector::{
    DetectorCascade, FernEnsemble, FernTables, NnClassifier, VarianceFilter, WindowGrid,
};

use crate::config::TldConfig;
use crate::error::TldError;

pub const MODEL_FORMAT: &str = "tld-model";
pub const MODEL_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TldModel {
    pub format: String,
    pub version: u32,
    pub frame_width: usize,
    pub frame_height: usize,
    pub object_width: i32,
    pub object_height: i32,
    pub config: TldConfig,
    pub min_variance: f64,
    pub ferns: FernTables,
    /// Mean-centred positive exemplars, oldest first.
    pub positives: Vec<Vec<f32>>,
    pub negatives: Vec<Vec<f32>>,
}

fn corrupt(msg: impl std::fmt::Display) -> TldError {
    TldError::ModelCorrupt(msg.to_string())
}

fn exemplars<'a>(patches: impl Iterator<Item = &'a NormalizedPatch>) -> Vec<Vec<f32>> {
    patches.map(|p| p.data().to_vec()).collect()
}

impl TldModel {
    /// Snapshot a trained cascade.
    pub fn capture(
        config: &TldConfig,
        frame_size: (usize, usize),
        object_size: (i32, i32),
        cascade: &DetectorCascade,
    ) -> Self {
        Self {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            frame_width: frame_size.0,
            frame_height: frame_size.1,
            object_width: object_size.0,
            object_height: object_size.1,
            config: config.clone(),
            min_variance: cascade.variance_filter().min_variance(),
            ferns: cascade.ensemble().tables(),
            positives: exemplars(cascade.nn().positives().iter()),
            negatives: exemplars(cascade.nn().negatives().iter()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TldError> {
        serde_json::to_vec(self).map_err(corrupt)
    }

    /// Parse a model and check its header. The content is validated by
    /// [`TldModel::into_cascade`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TldError> {
        let model: TldModel = serde_json::from_slice(bytes).map_err(corrupt)?;
        if model.format != MODEL_FORMAT {
            return Err(corrupt(format!("unknown format {:?}", model.format)));
        }
        if model.version != MODEL_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {MODEL_VERSION})",
                model.version
            )));
        }
        Ok(model)
    }

    /// Rebuild the detector this model was captured from.
    pub fn into_cascade(self) -> Result<DetectorCascade, TldError> {
        self.config.validate().map_err(corrupt)?;
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(corrupt("empty frame size"));
        }
        if self.object_width <= 0 || self.object_height <= 0 {
            return Err(corrupt("empty object size"));
        }
        if !self.min_variance.is_finite() || self.min_variance < 0.0 {
            return Err(corrupt(format!("invalid min variance {}", self.min_variance)));
        }

        let params = self.config.detector;
        let grid = WindowGrid::new(
            self.frame_width,
            self.frame_height,
            self.object_width,
            self.object_height,
            &params.grid,
        );
        let ensemble =
            FernEnsemble::from_tables(&params.ensemble, grid.scales(), self.ferns).map_err(corrupt)?;

        let size = params.patch_size;
        let restore = |set: Vec<Vec<f32>>| -> Result<Vec<NormalizedPatch>, TldError> {
            set.into_iter()
                .map(|data| NormalizedPatch::from_centred(size, data).map_err(corrupt))
                .collect()
        };
        let nn = NnClassifier::from_exemplars(
            &params.nn,
            size,
            restore(self.positives)?,
            restore(self.negatives)?,
        )
        .map_err(corrupt)?;

        Ok(DetectorCascade::from_parts(
            params,
            grid,
            VarianceFilter::new(self.min_variance),
            ensemble,
            nn,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tld_core::{GrayImage, Rect};

    use crate::config::LearningParams;
    use crate::learning::initial_learning;

    fn trained() -> (TldConfig, DetectorCascade, GrayImage) {
        let mut config = TldConfig::default();
        config.detector.grid.min_scale = -1;
        config.detector.grid.max_scale = 1;
        let rect = Rect::new(30, 30, 30, 30);
        let mut img = GrayImage::new(100, 100, 40);
        for y in 30..60 {
            for x in 30..60 {
                img.set(x, y, if (x / 3 + y / 5) % 2 == 0 { 220 } else { 90 });
            }
        }
        let mut cascade =
            DetectorCascade::new(100, 100, 30, 30, config.detector.clone()).expect("cascade");
        initial_learning(&mut cascade, &img.view(), &rect, &LearningParams::default())
            .expect("learn");
        (config, cascade, img)
    }

    #[test]
    fn exported_model_restores_the_same_detector() {
        let (config, cascade, img) = trained();
        let model = TldModel::capture(&config, (100, 100), (30, 30), &cascade);
        let bytes = model.to_bytes().expect("bytes");
        let restored = TldModel::from_bytes(&bytes).expect("parse");
        assert_eq!(restored, model);

        let rebuilt = restored.into_cascade().expect("cascade");
        let a = cascade.detect(&img.view());
        let b = rebuilt.detect(&img.view());
        assert_eq!(a.verdicts, b.verdicts);
        assert_eq!(a.posteriors, b.posteriors);
        assert_eq!(a.clusters, b.clusters);
    }

    #[test]
    fn garbage_and_foreign_headers_are_corrupt() {
        assert!(matches!(
            TldModel::from_bytes(b"not json"),
            Err(TldError::ModelCorrupt(_))
        ));

        let (config, cascade, _) = trained();
        let mut model = TldModel::capture(&config, (100, 100), (30, 30), &cascade);
        model.version = 7;
        let bytes = model.to_bytes().expect("bytes");
        assert!(matches!(
            TldModel::from_bytes(&bytes),
            Err(TldError::ModelCorrupt(_))
        ));
    }

    #[test]
    fn inconsistent_content_is_corrupt() {
        let (config, cascade, _) = trained();
        let base = TldModel::capture(&config, (100, 100), (30, 30), &cascade);

        let mut short_table = base.clone();
        short_table.ferns.positives.pop();
        assert!(matches!(
            short_table.into_cascade(),
            Err(TldError::ModelCorrupt(_))
        ));

        let mut bad_patch = base.clone();
        bad_patch.positives[0].truncate(10);
        assert!(matches!(
            bad_patch.into_cascade(),
            Err(TldError::ModelCorrupt(_))
        ));

        let mut nan = base.clone();
        nan.min_variance = f64::NAN;
        assert!(matches!(nan.into_cascade(), Err(TldError::ModelCorrupt(_))));

        let mut empty = base;
        empty.object_width = 0;
        assert!(matches!(empty.into_cascade(), Err(TldError::ModelCorrupt(_))));
    }
}
