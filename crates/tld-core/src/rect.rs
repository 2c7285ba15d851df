use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in pixels; 0 for degenerate boxes.
    #[inline]
    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`.
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    fn right_i64(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    #[inline]
    fn bottom_i64(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(
            self.x as f32 + 0.5 * self.width as f32,
            self.y as f32 + 0.5 * self.height as f32,
        )
    }

    /// True if the box has positive area and lies fully inside a `width x height` frame.
    pub fn is_inside(&self, width: usize, height: usize) -> bool {
        !self.is_degenerate()
            && self.x >= 0
            && self.y >= 0
            && self.right_i64() <= i64::try_from(width).unwrap_or(i64::MAX)
            && self.bottom_i64() <= i64::try_from(height).unwrap_or(i64::MAX)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right_i64().min(other.right_i64());
        let y1 = self.bottom_i64().min(other.bottom_i64());
        let width = i32::try_from(x1 - x0 as i64).ok()?;
        let height = i32::try_from(y1 - y0 as i64).ok()?;
        (width > 0 && height > 0).then(|| Rect::new(x0, y0, width, height))
    }

    /// Area of the union of two boxes.
    pub fn union_area(&self, other: &Rect) -> i64 {
        let inter = self.intersection(other).map(|r| r.area()).unwrap_or(0);
        self.area() + other.area() - inter
    }

    /// Intersection over union, in `[0, 1]`.
    ///
    /// Returns 0 for disjoint boxes and whenever either box is degenerate.
    pub fn overlap(&self, other: &Rect) -> f32 {
        let a = self.area();
        let b = other.area();
        if a == 0 || b == 0 {
            return 0.0;
        }
        let inter = self.intersection(other).map(|r| r.area()).unwrap_or(0);
        let union = self.union_area(other);
        if union <= 0 {
            return 0.0;
        }
        (inter as f64 / union as f64) as f32
    }

    /// Build from floating-point corner coordinates, rounding to the nearest pixel.
    pub fn from_f32(x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return None;
        }
        Some(Rect::new(
            x.round() as i32,
            y.round() as i32,
            width.round() as i32,
            height.round() as i32,
        ))
    }
}

/// Weighted mean of boxes; `None` if the weights sum to zero.
pub fn mean_rect<'a>(boxes: impl IntoIterator<Item = (&'a Rect, f32)>) -> Option<Rect> {
    let (mut sx, mut sy, mut sw, mut sh, mut total) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for (r, w) in boxes {
        let w = w as f64;
        sx += r.x as f64 * w;
        sy += r.y as f64 * w;
        sw += r.width as f64 * w;
        sh += r.height as f64 * w;
        total += w;
    }
    if total <= 0.0 {
        return None;
    }
    Rect::from_f32(
        (sx / total) as f32,
        (sy / total) as f32,
        (sw / total) as f32,
        (sh / total) as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_overlap_is_one() {
        for r in [
            Rect::new(0, 0, 1, 1),
            Rect::new(50, 50, 40, 40),
            Rect::new(-3, 7, 11, 2),
        ] {
            assert_eq!(r.overlap(&r), 1.0);
        }
    }

    #[test]
    fn overlap_is_symmetric_and_bounded() {
        let boxes = [
            Rect::new(0, 0, 10, 10),
            Rect::new(5, 5, 10, 10),
            Rect::new(2, 8, 30, 4),
            Rect::new(9, 9, 1, 1),
            Rect::new(-4, -4, 6, 6),
        ];
        for a in &boxes {
            for b in &boxes {
                let ab = a.overlap(b);
                assert_eq!(ab, b.overlap(a));
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn disjoint_and_touching_boxes_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.overlap(&Rect::new(20, 20, 5, 5)), 0.0);
        assert_eq!(a.overlap(&Rect::new(10, 0, 10, 10)), 0.0);
    }

    #[test]
    fn degenerate_boxes_score_zero() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.overlap(&Rect::new(0, 0, 0, 10)), 0.0);
        assert_eq!(Rect::new(0, 0, 0, 0).overlap(&Rect::new(0, 0, 0, 0)), 0.0);
        assert_eq!(a.overlap(&Rect::new(2, 2, -5, 4)), 0.0);
    }

    #[test]
    fn half_shift_overlap_matches_hand_computation() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 0, 10, 10);
        // 50 / 150
        assert!((a.overlap(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn inside_checks_frame_bounds() {
        assert!(Rect::new(0, 0, 10, 10).is_inside(10, 10));
        assert!(!Rect::new(1, 0, 10, 10).is_inside(10, 10));
        assert!(!Rect::new(-1, 0, 5, 5).is_inside(10, 10));
        assert!(!Rect::new(2, 2, 0, 5).is_inside(10, 10));
    }

    #[test]
    fn edges_near_the_integer_limit_do_not_wrap() {
        let far = Rect::new(i32::MAX - 5, 0, 10, 10);
        assert_eq!(far.right(), i32::MAX);
        assert!(!far.is_inside(200, 200));
        assert!(far.is_inside(usize::MAX, 10));
        assert!(!Rect::new(0, i32::MAX, 10, i32::MAX).is_inside(200, 200));

        let near = Rect::new(i32::MAX - 8, 0, 10, 10);
        let inter = far.intersection(&near).expect("intersection");
        assert_eq!(inter, Rect::new(i32::MAX - 5, 0, 7, 10));
        assert_eq!(far.union_area(&near), 100 + 100 - 70);
        assert!((far.overlap(&near) - 70.0 / 130.0).abs() < 1e-6);
        assert_eq!(far.overlap(&Rect::new(0, 0, 10, 10)), 0.0);

        let huge = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(huge.intersection(&Rect::new(0, 0, 10, 10)), None);
    }

    #[test]
    fn weighted_mean_favours_heavy_boxes() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(mean_rect([(&a, 1.0), (&b, 1.0)]), Some(Rect::new(5, 0, 10, 10)));
        assert_eq!(mean_rect([(&a, 9.0), (&b, 1.0)]), Some(Rect::new(1, 0, 10, 10)));
        assert_eq!(mean_rect(std::iter::empty()), None);
    }
}
