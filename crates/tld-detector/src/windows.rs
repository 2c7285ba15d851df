//! Multi-scale sliding-window grid, fixed once the object size is known.

use serde::{Deserialize, Serialize};
use tld_core::Rect;

use crate::params::WindowGridParams;

/// One scan position of the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub rect: Rect,
    /// Index into [`WindowGrid::scales`].
    pub scale_index: usize,
    /// Column and row of this window within its scale.
    pub grid: (u32, u32),
}

/// Every candidate window of a frame, in scan order (scale, row, column).
#[derive(Clone, Debug)]
pub struct WindowGrid {
    frame_width: usize,
    frame_height: usize,
    scales: Vec<(i32, i32)>,
    windows: Vec<CandidateWindow>,
}

impl WindowGrid {
    /// Build the grid for an `object_width x object_height` target.
    ///
    /// The scan area starts one pixel in from the top-left corner, so windows
    /// at a kept scale satisfy `1 <= x` and `x + w <= frame_width`.
    pub fn new(
        frame_width: usize,
        frame_height: usize,
        object_width: i32,
        object_height: i32,
        params: &WindowGridParams,
    ) -> Self {
        let scan_w = frame_width as i32 - 1;
        let scan_h = frame_height as i32 - 1;
        let mut scales = Vec::new();
        for k in params.min_scale..=params.max_scale {
            let s = params.scale_step.powi(k);
            let w = (object_width as f32 * s) as i32;
            let h = (object_height as f32 * s) as i32;
            if w < params.min_size || h < params.min_size || w > scan_w || h > scan_h {
                continue;
            }
            scales.push((w, h));
        }

        let mut windows = Vec::new();
        for (scale_index, &(w, h)) in scales.iter().enumerate() {
            let step_x = ((w as f32 * params.shift) as i32).max(1);
            let step_y = ((h as f32 * params.shift) as i32).max(1);
            let mut row = 0u32;
            let mut y = 1;
            while y + h <= 1 + scan_h {
                let mut col = 0u32;
                let mut x = 1;
                while x + w <= 1 + scan_w {
                    windows.push(CandidateWindow {
                        rect: Rect::new(x, y, w, h),
                        scale_index,
                        grid: (col, row),
                    });
                    x += step_x;
                    col += 1;
                }
                y += step_y;
                row += 1;
            }
        }

        log::debug!(
            "window grid: {} scales, {} windows for {}x{} object",
            scales.len(),
            windows.len(),
            object_width,
            object_height
        );

        Self {
            frame_width,
            frame_height,
            scales,
            windows,
        }
    }

    pub fn frame_size(&self) -> (usize, usize) {
        (self.frame_width, self.frame_height)
    }

    /// Window sizes of the kept scales.
    pub fn scales(&self) -> &[(i32, i32)] {
        &self.scales
    }

    pub fn windows(&self) -> &[CandidateWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Overlap of every window with `rect`, in window order.
    pub fn overlaps(&self, rect: &Rect) -> Vec<f32> {
        self.windows.iter().map(|w| w.rect.overlap(rect)).collect()
    }
}
