/// Errors raised when building a detector from parameters or stored state.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("invalid detector parameters: {0}")]
    InvalidParams(String),
    #[error("fern table has {got} entries, expected {expected}")]
    TableSize { expected: usize, got: usize },
    #[error("fern feature list has {got} entries, expected {expected}")]
    FeatureCount { expected: usize, got: usize },
    #[error("fern feature coordinate {0} is outside [0, 1]")]
    FeatureRange(f32),
    #[error("exemplar patch is {got}x{got}, expected {expected}x{expected}")]
    PatchSize { expected: usize, got: usize },
    #[error("{got} exemplars exceed capacity {capacity}")]
    Capacity { capacity: usize, got: usize },
}
