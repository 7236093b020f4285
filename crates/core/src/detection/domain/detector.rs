use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::geometry::Rect;

/// Part classes a detector can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartKind {
    Head,
    Body,
}

/// One detector hit: a part class, its bounds in frame coordinates, and
/// the backend's confidence exactly as reported.
///
/// Confidence is not validated here; assembly decides what to do with
/// out-of-range values.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub kind: PartKind,
    pub bounds: Rect,
    pub confidence: f64,
}

/// Fatal detection failures. Either case ends the run: a backend that
/// cannot infer, or one whose output no longer matches the expected
/// shape, produces no usable detections.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detection backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Detector output violates the detection contract: {0}")]
    ContractViolation(String),
}

/// Domain interface for part detection.
///
/// Implementations may be stateful (frame skipping, caching), hence
/// `&mut self`.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectionError>;
}
