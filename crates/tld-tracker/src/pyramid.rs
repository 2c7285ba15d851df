//! Float image pyramids with precomputed gradients.

use tld_core::GrayImageView;

/// Single-channel `f32` image.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn from_gray(src: &GrayImageView<'_>) -> Self {
        Self {
            width: src.width,
            height: src.height,
            data: src.data.iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    fn at_clamped(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width + x]
    }

    /// Bilinear sample, replicating the border.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);
        let p00 = self.at_clamped(x0, y0);
        let p10 = self.at_clamped(x0 + 1, y0);
        let p01 = self.at_clamped(x0, y0 + 1);
        let p11 = self.at_clamped(x0 + 1, y0 + 1);
        let a = p00 + fx * (p10 - p00);
        let b = p01 + fx * (p11 - p01);
        a + fy * (b - a)
    }

    /// Half-resolution image, each pixel the mean of a 2x2 block.
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let (sx, sy) = (2 * x as i32, 2 * y as i32);
                let s = self.at_clamped(sx, sy)
                    + self.at_clamped(sx + 1, sy)
                    + self.at_clamped(sx, sy + 1)
                    + self.at_clamped(sx + 1, sy + 1);
                data.push(0.25 * s);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Central-difference gradients `(d/dx, d/dy)`.
    fn gradients(&self) -> (FloatImage, FloatImage) {
        let mut gx = Vec::with_capacity(self.data.len());
        let mut gy = Vec::with_capacity(self.data.len());
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                gx.push(0.5 * (self.at_clamped(x + 1, y) - self.at_clamped(x - 1, y)));
                gy.push(0.5 * (self.at_clamped(x, y + 1) - self.at_clamped(x, y - 1)));
            }
        }
        let wrap = |data| FloatImage {
            width: self.width,
            height: self.height,
            data,
        };
        (wrap(gx), wrap(gy))
    }
}

/// One pyramid level.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub image: FloatImage,
    pub grad_x: FloatImage,
    pub grad_y: FloatImage,
}

/// Coarse-to-fine image pyramid; level 0 is full resolution.
#[derive(Clone, Debug)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Build up to `levels` levels, stopping early once a level would be
    /// narrower than `min_side` pixels.
    pub fn new(frame: &GrayImageView<'_>, levels: usize, min_side: usize) -> Self {
        let mut out = Vec::with_capacity(levels.max(1));
        let mut image = FloatImage::from_gray(frame);
        loop {
            let (grad_x, grad_y) = image.gradients();
            let next = (out.len() + 1 < levels
                && image.width / 2 >= min_side
                && image.height / 2 >= min_side)
                .then(|| image.downsample());
            out.push(PyramidLevel {
                image,
                grad_x,
                grad_y,
            });
            match next {
                Some(n) => image = n,
                None => break,
            }
        }
        Self { levels: out }
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Full-resolution size.
    pub fn size(&self) -> (usize, usize) {
        self.levels
            .first()
            .map(|l| (l.image.width, l.image.height))
            .unwrap_or((0, 0))
    }
}
