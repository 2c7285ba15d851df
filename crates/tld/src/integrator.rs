use tld_core::{GrayImageView, Rect};
use tld_detector::{DetectorCascade, DetectorError};
use tld_tracker::MedianFlowTracker;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::TldConfig;
use crate::error::TldError;
use crate::fusion::{fuse, FusionThresholds, Hypothesis};
use crate::learning::{initial_learning, learn_frame};
use crate::model::TldModel;
use crate::state::{FrameResult, FrameStats, TrackingState};

/// Online single-object tracker.
///
/// One instance tracks one object in frames of a fixed size. Frames must be
/// fed in order; each [`process_frame`](Tld::process_frame) call runs
/// detection, tracking, fusion and learning to completion.
#[derive(Debug)]
pub struct Tld {
    width: usize,
    height: usize,
    config: TldConfig,
    state: TrackingState,
    detector: Option<DetectorCascade>,
    object_size: (i32, i32),
    tracker: MedianFlowTracker,
    current: Option<Rect>,
    confidence: f32,
    was_valid: bool,
    valid_frames: u64,
    frame_index: u64,
}

impl Tld {
    pub fn new(width: usize, height: usize, config: TldConfig) -> Result<Self, TldError> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidParams(format!(
                "frame size {width}x{height} is empty"
            ))
            .into());
        }
        Ok(Self {
            width,
            height,
            tracker: MedianFlowTracker::new(config.tracker.clone()),
            config,
            state: TrackingState::Uninitialized,
            detector: None,
            object_size: (0, 0),
            current: None,
            confidence: 0.0,
            was_valid: false,
            valid_frames: 0,
            frame_index: 0,
        })
    }

    pub fn frame_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn config(&self) -> &TldConfig {
        &self.config
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Box reported by the last frame.
    pub fn current_box(&self) -> Option<Rect> {
        self.current
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn detector(&self) -> Option<&DetectorCascade> {
        self.detector.as_ref()
    }

    pub fn learning_enabled(&self) -> bool {
        self.config.learning.enabled
    }

    pub fn set_learning_enabled(&mut self, enabled: bool) {
        log::info!("learning {}", if enabled { "enabled" } else { "disabled" });
        self.config.learning.enabled = enabled;
    }

    pub fn alternating(&self) -> bool {
        self.config.learning.alternating
    }

    pub fn set_alternating(&mut self, alternating: bool) {
        log::info!("alternating learning {}", if alternating { "on" } else { "off" });
        self.config.learning.alternating = alternating;
    }

    fn check_frame(&self, frame: &GrayImageView<'_>) -> Result<(), TldError> {
        if (frame.width, frame.height) != (self.width, self.height)
            || frame.data.len() != frame.width * frame.height
        {
            return Err(TldError::DimensionMismatch {
                expected: (self.width, self.height),
                got: (frame.width, frame.height),
            });
        }
        Ok(())
    }

    /// Start tracking `rect` in `frame`, discarding any previous model.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(rect = ?rect))
    )]
    pub fn select_object(&mut self, frame: &GrayImageView<'_>, rect: Rect) -> Result<(), TldError> {
        self.check_frame(frame)?;
        if !rect.is_inside(self.width, self.height) {
            return Err(TldError::InvalidRegion {
                rect,
                frame_width: self.width,
                frame_height: self.height,
            });
        }

        let mut detector = DetectorCascade::new(
            self.width,
            self.height,
            rect.width,
            rect.height,
            self.config.detector.clone(),
        )?;
        let report = initial_learning(&mut detector, frame, &rect, &self.config.learning)?;
        log::info!(
            "selected {:?}: {} windows, {} scales, {} negatives",
            rect,
            detector.grid().len(),
            detector.grid().scales().len(),
            report.nn_negatives
        );

        self.detector = Some(detector);
        self.object_size = (rect.width, rect.height);
        self.tracker.set_reference(frame);
        self.state = TrackingState::Tracking;
        self.current = Some(rect);
        self.confidence = 1.0;
        self.was_valid = true;
        self.valid_frames = 0;
        Ok(())
    }

    /// Run one frame through detection, tracking, fusion and learning.
    ///
    /// Losing the object is reported through the result, not as an error.
    /// Before an object is selected every frame yields no box.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, frame), fields(frame = self.frame_index))
    )]
    pub fn process_frame(&mut self, frame: &GrayImageView<'_>) -> Result<FrameResult, TldError> {
        self.check_frame(frame)?;
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let Some(detector) = self.detector.as_mut() else {
            return Ok(FrameResult {
                stats: FrameStats {
                    frame_index,
                    ..FrameStats::default()
                },
                ..FrameResult::default()
            });
        };

        let detection = detector.detect(frame);

        let (flow, tracked) = if self.state == TrackingState::Tracking {
            let result = self.tracker.track(frame, self.current.as_ref());
            let hypothesis = result.bbox.map(|rect| Hypothesis {
                rect,
                confidence: detector.nn_confidence(frame, &rect),
            });
            (Some(result.stats), hypothesis)
        } else {
            self.tracker.set_reference(frame);
            (None, None)
        };

        let clusters: Vec<Hypothesis> = detection
            .clusters
            .iter()
            .map(|c| Hypothesis {
                rect: c.rect,
                confidence: detector.nn_confidence(frame, &c.rect),
            })
            .collect();
        let thresholds = FusionThresholds {
            theta_p: detector.nn().theta_p(),
            theta_n: detector.nn().theta_n(),
        };
        let fused = fuse(
            tracked,
            &clusters,
            self.was_valid,
            &thresholds,
            &self.config.fusion,
        );

        let mut learned = false;
        if fused.valid {
            self.valid_frames += 1;
        }
        let learning = &self.config.learning;
        let turn = !learning.alternating || self.valid_frames % 2 == 1;
        if learning.enabled && fused.valid && turn {
            if let Some(rect) = fused.bbox {
                learned = learn_frame(detector, frame, &rect, &detection, learning)?.changed();
            }
        }

        let next = if fused.bbox.is_some() {
            TrackingState::Tracking
        } else {
            TrackingState::Lost
        };
        if next != self.state {
            log::info!("frame {frame_index}: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        self.current = fused.bbox;
        self.confidence = fused.confidence;
        self.was_valid = fused.valid;

        Ok(FrameResult {
            bbox: fused.bbox,
            confidence: fused.confidence,
            state: next,
            learned,
            stats: FrameStats {
                frame_index,
                source: fused.source,
                cascade: detection.stats,
                flow,
                tracker_confidence: tracked.map(|t| t.confidence),
            },
        })
    }

    /// Forget the object and its model.
    pub fn clear(&mut self) {
        log::info!("cleared");
        self.detector = None;
        self.object_size = (0, 0);
        self.tracker.reset();
        self.state = TrackingState::Uninitialized;
        self.current = None;
        self.confidence = 0.0;
        self.was_valid = false;
        self.valid_frames = 0;
    }

    /// Serialize the learned model and configuration.
    pub fn export_model(&self) -> Result<Vec<u8>, TldError> {
        let detector = self.detector.as_ref().ok_or(TldError::NotInitialized)?;
        let model = TldModel::capture(
            &self.config,
            (self.width, self.height),
            self.object_size,
            detector,
        );
        let bytes = model.to_bytes()?;
        log::info!(
            "exported model: {} positives, {} negatives, {} bytes",
            model.positives.len(),
            model.negatives.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Restore a tracker from [`export_model`](Tld::export_model) output.
    ///
    /// The tracker starts `Lost` and reacquires the object through the
    /// detector.
    pub fn import_model(bytes: &[u8]) -> Result<Self, TldError> {
        let model = TldModel::from_bytes(bytes)?;
        let (width, height) = (model.frame_width, model.frame_height);
        let object_size = (model.object_width, model.object_height);
        let config = model.config.clone();
        let detector = model.into_cascade()?;
        log::info!(
            "imported model for {width}x{height} frames: {} positives, {} negatives",
            detector.nn().positives().len(),
            detector.nn().negatives().len()
        );

        let mut tld = Self::new(width, height, config).map_err(|e| TldError::ModelCorrupt(e.to_string()))?;
        tld.detector = Some(detector);
        tld.object_size = object_size;
        tld.state = TrackingState::Lost;
        Ok(tld)
    }
}
