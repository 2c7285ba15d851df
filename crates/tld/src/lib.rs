//! Tracking-Learning-Detection: long-term tracking of one object.
//!
//! [`Tld`] combines a short-term [`MedianFlowTracker`](tld_tracker::MedianFlowTracker)
//! with a sliding-window [`DetectorCascade`](tld_detector::DetectorCascade)
//! that is trained online from the tracker's own output (P-N learning). The
//! detector reacquires the object after occlusions and corrects tracker
//! drift.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tld::{Rect, Tld, TldConfig};
//! use tld::frames::{gray_view, load_gray};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let first = load_gray("frame0000.png")?;
//! let mut tld = Tld::new(first.width() as usize, first.height() as usize, TldConfig::default())?;
//! tld.select_object(&gray_view(&first), Rect::new(120, 80, 64, 48))?;
//!
//! let next = load_gray("frame0001.png")?;
//! let result = tld.process_frame(&gray_view(&next))?;
//! println!("{:?} ({:.2})", result.bbox, result.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tld::core`: frames, rectangles, integral images and normalized patches.
//! - `tld::detector`: window grid and the variance / fern / NN cascade.
//! - `tld::tracker`: pyramidal Lucas-Kanade and the median-flow tracker.
//! - `tld::frames` (feature `image`): conversions from `image::GrayImage`.

pub use tld_core as core;
pub use tld_detector as detector;
pub use tld_tracker as tracker;

mod config;
mod error;
mod fusion;
mod integrator;
mod io;
mod learning;
mod model;
mod state;

#[cfg(feature = "image")]
pub mod frames;

pub use config::{FusionParams, LearningParams, TldConfig};
pub use error::TldError;
pub use integrator::Tld;
pub use io::{load_json, write_json, TldIoError};
pub use learning::{initial_learning, learn_frame, LearningReport};
pub use model::{TldModel, MODEL_FORMAT, MODEL_VERSION};
pub use state::{FrameResult, FrameStats, OutputSource, TrackingState};

pub use tld_core::{GrayImage, GrayImageView, Rect};
