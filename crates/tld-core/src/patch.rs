//! Fixed-size, mean-centred patches and their correlation.

use thiserror::Error;

use crate::image::{sample_bilinear, GrayImageView};
use crate::rect::Rect;

/// Side length of a normalized patch when nothing else is configured.
pub const DEFAULT_PATCH_SIZE: usize = 15;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid region {width}x{height} at ({x}, {y})")]
    InvalidRegion {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("patch buffer of {got} samples does not match size {size}x{size}")]
    SizeMismatch { size: usize, got: usize },
    #[error("patch contains non-finite samples")]
    NonFinite,
}

/// An `S x S` grid resampled from a frame region, with its mean subtracted.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPatch {
    size: usize,
    data: Vec<f32>,
}

impl NormalizedPatch {
    /// Bilinearly resample `region` of `frame` to `size x size` and mean-centre it.
    ///
    /// Sample `i` of a row reads the source at `x + (i + 0.5) * w / size - 0.5`,
    /// i.e. at the centre of the `i`-th output cell.
    pub fn from_region(
        frame: &GrayImageView<'_>,
        region: &Rect,
        size: usize,
    ) -> Result<Self, PatchError> {
        if region.is_degenerate() || size == 0 {
            return Err(PatchError::InvalidRegion {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
            });
        }
        let sx = region.width as f32 / size as f32;
        let sy = region.height as f32 / size as f32;
        let mut data = Vec::with_capacity(size * size);
        for j in 0..size {
            let y = region.y as f32 + (j as f32 + 0.5) * sy - 0.5;
            for i in 0..size {
                let x = region.x as f32 + (i as f32 + 0.5) * sx - 0.5;
                data.push(sample_bilinear(frame, x, y));
            }
        }
        Ok(Self::centred(size, data))
    }

    /// Mean-centre an existing `size x size` buffer.
    pub fn from_samples(size: usize, data: Vec<f32>) -> Result<Self, PatchError> {
        if size == 0 || data.len() != size * size {
            return Err(PatchError::SizeMismatch {
                size,
                got: data.len(),
            });
        }
        Ok(Self::centred(size, data))
    }

    /// Wrap samples that are already mean-centred, keeping them bit for bit.
    pub fn from_centred(size: usize, data: Vec<f32>) -> Result<Self, PatchError> {
        if size == 0 || data.len() != size * size {
            return Err(PatchError::SizeMismatch {
                size,
                got: data.len(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PatchError::NonFinite);
        }
        Ok(Self { size, data })
    }

    fn centred(size: usize, mut data: Vec<f32>) -> Self {
        let mean = data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64;
        let mean = mean as f32;
        for v in &mut data {
            *v -= mean;
        }
        Self { size, data }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn mean(&self) -> f32 {
        (self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64) as f32
    }

    /// Population variance of the samples.
    pub fn variance(&self) -> f64 {
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        self.data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n
    }

    fn norm_sq(&self) -> f64 {
        self.data.iter().map(|&v| v as f64 * v as f64).sum()
    }

    /// True when the patch carries no usable texture.
    pub fn is_flat(&self) -> bool {
        self.norm_sq() <= FLAT_EPS * self.data.len() as f64
    }

    /// Normalized cross-correlation in `[-1, 1]`.
    ///
    /// Two flat patches correlate perfectly; a flat patch against a textured
    /// one scores 0. Patches of different sizes score 0.
    pub fn ncc(&self, other: &NormalizedPatch) -> f32 {
        if self.size != other.size {
            return 0.0;
        }
        let na = self.norm_sq();
        let nb = other.norm_sq();
        // f32 rounding leaves tiny residue on flat patches
        match (self.is_flat(), other.is_flat()) {
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => {
                let dot: f64 = self
                    .data
                    .iter()
                    .zip(&other.data)
                    .map(|(&a, &b)| a as f64 * b as f64)
                    .sum();
                (dot / (na * nb).sqrt()).clamp(-1.0, 1.0) as f32
            }
        }
    }

    /// Correlation bounded to `[0, 1]`: uncorrelated and anticorrelated
    /// patches share nothing.
    pub fn similarity(&self, other: &NormalizedPatch) -> f32 {
        self.ncc(other).max(0.0)
    }
}

const FLAT_EPS: f64 = 1e-8;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayImage;
    use approx::assert_abs_diff_eq;

    fn textured(width: usize, height: usize) -> GrayImage {
        let data = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                ((x * 31 + y * 17 + (x * y) % 23) % 251) as u8
            })
            .collect();
        GrayImage::from_raw(width, height, data).expect("buffer")
    }

    #[test]
    fn output_is_square_and_zero_mean() {
        let img = textured(64, 48);
        for r in [Rect::new(0, 0, 64, 48), Rect::new(10, 5, 7, 30), Rect::new(3, 3, 1, 1)] {
            let p = NormalizedPatch::from_region(&img.view(), &r, 15).expect("patch");
            assert_eq!(p.size(), 15);
            assert_eq!(p.data().len(), 225);
            assert_abs_diff_eq!(p.mean(), 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn renormalizing_is_idempotent() {
        let img = textured(40, 40);
        let p = NormalizedPatch::from_region(&img.view(), &Rect::new(4, 6, 20, 25), 15)
            .expect("patch");
        let q = NormalizedPatch::from_samples(15, p.data().to_vec()).expect("samples");
        for (a, b) in p.data().iter().zip(q.data()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn degenerate_regions_are_rejected() {
        let img = textured(10, 10);
        let err = NormalizedPatch::from_region(&img.view(), &Rect::new(1, 2, 0, 5), 15)
            .expect_err("degenerate");
        assert_eq!(
            err,
            PatchError::InvalidRegion {
                x: 1,
                y: 2,
                width: 0,
                height: 5
            }
        );
        assert!(NormalizedPatch::from_region(&img.view(), &Rect::new(1, 2, 4, -1), 15).is_err());
    }

    #[test]
    fn identity_region_copies_pixels() {
        let img = textured(15, 15);
        let p = NormalizedPatch::from_region(&img.view(), &Rect::new(0, 0, 15, 15), 15)
            .expect("patch");
        let mean = img.data.iter().map(|&v| v as f32).sum::<f32>() / 225.0;
        assert_abs_diff_eq!(p.data()[16], img.view().get(1, 1) as f32 - mean, epsilon = 1e-3);
    }

    #[test]
    fn self_similarity_is_maximal() {
        let img = textured(50, 50);
        let p = NormalizedPatch::from_region(&img.view(), &Rect::new(5, 5, 30, 30), 15)
            .expect("patch");
        assert_abs_diff_eq!(p.ncc(&p), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.similarity(&p), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn flat_patch_conventions() {
        let flat = NormalizedPatch::from_samples(3, vec![7.0; 9]).expect("flat");
        let other_flat = NormalizedPatch::from_samples(3, vec![200.0; 9]).expect("flat");
        let ramp = NormalizedPatch::from_samples(3, (0..9).map(|v| v as f32).collect())
            .expect("ramp");
        assert_eq!(flat.variance(), 0.0);
        assert_eq!(flat.ncc(&other_flat), 1.0);
        assert_eq!(flat.ncc(&ramp), 0.0);
        assert_eq!(ramp.ncc(&flat), 0.0);
        assert_eq!(flat.similarity(&ramp), 0.0);
        assert_eq!(flat.similarity(&other_flat), 1.0);
    }

    #[test]
    fn inverted_patch_anticorrelates() {
        let a = NormalizedPatch::from_samples(2, vec![0.0, 1.0, 2.0, 3.0]).expect("a");
        let b = NormalizedPatch::from_samples(2, vec![3.0, 2.0, 1.0, 0.0]).expect("b");
        assert_abs_diff_eq!(a.ncc(&b), -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(a.similarity(&b), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn centred_samples_are_kept_verbatim() {
        let data = vec![-1.5, 0.25, 1.25, 0.0];
        let p = NormalizedPatch::from_centred(2, data.clone()).expect("patch");
        assert_eq!(p.data(), &data[..]);
        assert_eq!(
            NormalizedPatch::from_centred(2, vec![0.0, f32::NAN, 0.0, 0.0]),
            Err(PatchError::NonFinite)
        );
        assert!(NormalizedPatch::from_centred(2, vec![0.0; 4]).expect("flat").is_flat());
    }

    #[test]
    fn wrong_sample_count_is_rejected() {
        assert_eq!(
            NormalizedPatch::from_samples(4, vec![0.0; 15]),
            Err(PatchError::SizeMismatch { size: 4, got: 15 })
        );
    }
}
