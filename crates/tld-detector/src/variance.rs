use tld_core::{IntegralImage, Rect};

/// First cascade stage: rejects low-texture windows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VarianceFilter {
    min_variance: f64,
}

impl VarianceFilter {
    pub fn new(min_variance: f64) -> Self {
        Self {
            min_variance: min_variance.max(0.0),
        }
    }

    /// Threshold derived from the variance of the selected object patch.
    pub fn from_object_variance(object_variance: f64, fraction: f64) -> Self {
        Self::new(object_variance * fraction)
    }

    pub fn min_variance(&self) -> f64 {
        self.min_variance
    }

    /// True if `rect` carries texture and reaches the threshold.
    ///
    /// A constant window is rejected even when the threshold is 0.
    pub fn accepts(&self, integral: &IntegralImage, rect: &Rect) -> bool {
        match integral.variance(rect) {
            Some(var) => var > 0.0 && var >= self.min_variance,
            None => false,
        }
    }
}
