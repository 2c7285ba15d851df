//! Sparse pyramidal Lucas-Kanade point tracking.

use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::pyramid::{Pyramid, PyramidLevel};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LkParams {
    /// Odd side length of the integration window.
    pub window: usize,
    pub levels: usize,
    pub max_iterations: usize,
    /// Stop iterating once an update is shorter than this, in pixels.
    pub epsilon: f32,
    /// Minimum eigenvalue of the structure tensor, per window pixel.
    pub min_eigen: f32,
}

impl Default for LkParams {
    fn default() -> Self {
        Self {
            window: 15,
            levels: 3,
            max_iterations: 20,
            epsilon: 0.03,
            min_eigen: 1e-4,
        }
    }
}

impl LkParams {
    fn half(&self) -> i32 {
        (self.window / 2) as i32
    }
}

/// Smaller eigenvalue of a symmetric 2x2 matrix, computed as `det / max`
/// so a rank-deficient tensor yields exactly 0.
fn min_eigenvalue(gxx: f32, gxy: f32, gyy: f32) -> f32 {
    let half_trace = 0.5 * (gxx + gyy);
    let root = (0.25 * (gxx - gyy) * (gxx - gyy) + gxy * gxy).sqrt();
    let max = half_trace + root;
    if max <= 0.0 {
        return 0.0;
    }
    let det = gxx * gyy - gxy * gxy;
    (det / max).max(0.0)
}

enum LevelOutcome {
    Refined(Vector2<f32>),
    Degenerate,
}

/// Refine displacement `d` of point `p` (both at this level's resolution).
fn refine_level(
    prev: &PyramidLevel,
    next: &PyramidLevel,
    p: Point2<f32>,
    mut d: Vector2<f32>,
    params: &LkParams,
) -> LevelOutcome {
    let half = params.half();
    let n = (2 * half + 1) as usize;
    let mut ix = Vec::with_capacity(n * n);
    let mut iy = Vec::with_capacity(n * n);
    let mut iv = Vec::with_capacity(n * n);
    let (mut gxx, mut gxy, mut gyy) = (0.0f32, 0.0f32, 0.0f32);
    for wy in -half..=half {
        for wx in -half..=half {
            let (x, y) = (p.x + wx as f32, p.y + wy as f32);
            let gx = prev.grad_x.sample(x, y);
            let gy = prev.grad_y.sample(x, y);
            gxx += gx * gx;
            gxy += gx * gy;
            gyy += gy * gy;
            ix.push(gx);
            iy.push(gy);
            iv.push(prev.image.sample(x, y));
        }
    }

    if min_eigenvalue(gxx, gxy, gyy) / ((n * n) as f32) < params.min_eigen {
        return LevelOutcome::Degenerate;
    }
    let Some(g_inv) = Matrix2::new(gxx, gxy, gxy, gyy).try_inverse() else {
        return LevelOutcome::Degenerate;
    };

    for _ in 0..params.max_iterations {
        let (mut bx, mut by) = (0.0f32, 0.0f32);
        let mut k = 0;
        for wy in -half..=half {
            for wx in -half..=half {
                let j = next.image.sample(p.x + d.x + wx as f32, p.y + d.y + wy as f32);
                let diff = iv[k] - j;
                bx += ix[k] * diff;
                by += iy[k] * diff;
                k += 1;
            }
        }
        let delta = g_inv * Vector2::new(bx, by);
        d += delta;
        if !(d.x.is_finite() && d.y.is_finite()) {
            return LevelOutcome::Degenerate;
        }
        if delta.norm() < params.epsilon {
            break;
        }
    }
    LevelOutcome::Refined(d)
}

/// Track one point from `prev` to `next`.
///
/// Returns `None` when the structure tensor at full resolution is
/// degenerate or the result leaves the frame. Degenerate coarse levels only
/// skip their refinement.
pub fn track_point(
    prev: &Pyramid,
    next: &Pyramid,
    point: Point2<f32>,
    params: &LkParams,
) -> Option<Point2<f32>> {
    let levels = prev.len().min(next.len());
    if levels == 0 {
        return None;
    }
    let mut d = Vector2::zeros();
    for lvl in (0..levels).rev() {
        let scale = 1.0 / (1u32 << lvl) as f32;
        let p = Point2::new(point.x * scale, point.y * scale);
        match refine_level(&prev.levels()[lvl], &next.levels()[lvl], p, d, params) {
            LevelOutcome::Refined(refined) => d = refined,
            LevelOutcome::Degenerate if lvl == 0 => return None,
            LevelOutcome::Degenerate => {}
        }
        if lvl > 0 {
            d *= 2.0;
        }
    }
    let q = point + d;
    let (w, h) = next.size();
    let inside = q.x >= 0.0 && q.y >= 0.0 && q.x <= (w - 1) as f32 && q.y <= (h - 1) as f32;
    inside.then_some(q)
}
