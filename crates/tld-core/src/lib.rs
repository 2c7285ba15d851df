//! Core primitives shared by the TLD detector, tracker and integrator.
//!
//! Frames are borrowed 8-bit grayscale buffers. Everything here is pure and
//! allocation-light; no stage of the tracker lives in this crate.

mod image;
mod integral;
mod logger;
mod patch;
mod rect;

pub use image::{sample_bilinear, GrayImage, GrayImageView};
pub use integral::IntegralImage;
pub use patch::{NormalizedPatch, PatchError, DEFAULT_PATCH_SIZE};
pub use rect::{mean_rect, Rect};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
