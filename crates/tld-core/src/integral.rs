//! Summed-area tables for constant-time window statistics.

use crate::image::GrayImageView;
use crate::rect::Rect;

/// Integral images of intensities and squared intensities.
///
/// Both tables are `(width + 1) x (height + 1)` with a zero first row and
/// column, so any window sum is four lookups. Sums are exact `u64`.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(src: &GrayImageView<'_>) -> Self {
        let stride = src.width + 1;
        let mut sum = vec![0u64; stride * (src.height + 1)];
        let mut sq_sum = vec![0u64; stride * (src.height + 1)];

        for y in 0..src.height {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            let src_row = &src.data[y * src.width..(y + 1) * src.width];
            for (x, &p) in src_row.iter().enumerate() {
                let p = p as u64;
                row += p;
                row_sq += p * p;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sq_sum[i] = sq_sum[i - stride] + row_sq;
            }
        }

        Self {
            width: src.width,
            height: src.height,
            sum,
            sq_sum,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn window(table: &[u64], stride: usize, r: &Rect) -> u64 {
        let x0 = r.x as usize;
        let y0 = r.y as usize;
        let x1 = r.right() as usize;
        let y1 = r.bottom() as usize;
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    /// Sum and squared sum inside `r`; `None` if `r` is not inside the frame.
    pub fn sums(&self, r: &Rect) -> Option<(u64, u64)> {
        if !r.is_inside(self.width, self.height) {
            return None;
        }
        let stride = self.width + 1;
        Some((
            Self::window(&self.sum, stride, r),
            Self::window(&self.sq_sum, stride, r),
        ))
    }

    /// Mean intensity inside `r`.
    pub fn mean(&self, r: &Rect) -> Option<f64> {
        let (s, _) = self.sums(r)?;
        Some(s as f64 / r.area() as f64)
    }

    /// Population variance of the intensities inside `r`.
    ///
    /// Computed as `(n * sum_sq - sum^2) / n^2` in integers, so a constant
    /// window yields exactly 0.
    pub fn variance(&self, r: &Rect) -> Option<f64> {
        let (s, sq) = self.sums(r)?;
        let n = r.area() as u128;
        let num = n * sq as u128 - (s as u128) * (s as u128);
        Some(num as f64 / (n * n) as f64)
    }
}
