use crate::detection::domain::detector::{DetectionError, Detector, RawDetection};
use crate::shared::frame::Frame;

/// Decorator that runs detection every N frames, replaying the last
/// results in between.
///
/// Detections carry no cross-frame identity, so skipped frames repeat
/// the stale boxes verbatim; keep the interval small where motion
/// matters.
pub struct SkipFrameDetector {
    inner: Box<dyn Detector>,
    skip_interval: usize,
    frame_count: usize,
    last_detections: Vec<RawDetection>,
}

impl SkipFrameDetector {
    pub fn new(inner: Box<dyn Detector>, skip_interval: usize) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            inner,
            skip_interval,
            frame_count: 0,
            last_detections: Vec::new(),
        })
    }
}

impl Detector for SkipFrameDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectionError> {
        if self.frame_count % self.skip_interval == 0 {
            self.last_detections = self.inner.detect(frame)?;
        }
        self.frame_count += 1;
        Ok(self.last_detections.clone())
    }
}
