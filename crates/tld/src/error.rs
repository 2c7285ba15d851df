use tld_core::{PatchError, Rect};
use tld_detector::DetectorError;

/// Errors returned by [`Tld`](crate::Tld).
///
/// Losing the object is not an error; it is reported through
/// [`FrameResult`](crate::FrameResult).
#[derive(thiserror::Error, Debug)]
pub enum TldError {
    #[error("region {rect:?} is empty or not inside the {frame_width}x{frame_height} frame")]
    InvalidRegion {
        rect: Rect,
        frame_width: usize,
        frame_height: usize,
    },
    #[error("frame size {got:?} differs from the initialized size {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("model rejected: {0}")]
    ModelCorrupt(String),
    #[error("no object has been selected")]
    NotInitialized,
    #[error(transparent)]
    InvalidConfig(#[from] DetectorError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}
