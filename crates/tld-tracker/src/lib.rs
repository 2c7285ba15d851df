//! Short-term tracker of the TLD pipeline.
//!
//! [`MedianFlowTracker`] propagates a bounding box between consecutive
//! frames using forward-backward validated Lucas-Kanade flow on
//! [`Pyramid`]s.

mod lk;
mod median_flow;
mod pyramid;

pub use lk::{track_point, LkParams};
pub use median_flow::{FlowStats, MedianFlowParams, MedianFlowTracker, TrackResult};
pub use pyramid::{FloatImage, Pyramid, PyramidLevel};
