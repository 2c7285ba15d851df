use serde::{Deserialize, Serialize};
use tld_core::Rect;
use tld_detector::CascadeStats;
use tld_tracker::FlowStats;

/// Lifecycle of the tracked object.
///
/// `Uninitialized -> Tracking` on selection, `Tracking <-> Lost` frame by
/// frame, and any state back to `Uninitialized` on [`clear`](crate::Tld::clear).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    #[default]
    Uninitialized,
    Tracking,
    Lost,
}

/// Which hypothesis produced the output box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSource {
    #[default]
    None,
    Tracker,
    Detector,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_index: u64,
    pub source: OutputSource,
    pub cascade: CascadeStats,
    /// Present when the median-flow tracker ran on this frame.
    pub flow: Option<FlowStats>,
    /// NN confidence of the tracked box, when the tracker produced one.
    pub tracker_confidence: Option<f32>,
}

/// Per-frame output of [`Tld::process_frame`](crate::Tld::process_frame).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Object box, `None` when the object is not visible or not selected.
    pub bbox: Option<Rect>,
    /// NN relative similarity of the output box; 0 without a box.
    pub confidence: f32,
    pub state: TrackingState,
    /// Whether the model was updated from this frame.
    pub learned: bool,
    pub stats: FrameStats,
}

impl FrameResult {
    /// True if a box is present and its confidence reaches `threshold`.
    pub fn is_trusted(&self, threshold: f32) -> bool {
        self.bbox.is_some() && self.confidence >= threshold
    }
}
