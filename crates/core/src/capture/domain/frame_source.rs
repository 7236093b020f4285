use thiserror::Error;

use crate::shared::frame::Frame;

/// What a source reports once it is open: the pixel size every
/// subsequent frame will have, and a human-readable label for logs.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub label: String,
}

/// Failures while opening a source or acquiring frames from it.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture device unavailable: {reason}")]
    DeviceUnavailable { reason: String },

    #[error("Monitor enumeration failed: {reason}")]
    MonitorEnumeration { reason: String },

    #[error("No monitors detected")]
    NoMonitors,

    #[error("Monitor {index} requested but only {count} present")]
    MonitorOutOfRange { index: usize, count: usize },

    #[error("Capture box {box_size}px does not fit the {width}x{height} monitor")]
    RegionTooLarge {
        box_size: u32,
        width: u32,
        height: u32,
    },

    #[error("Frame acquisition failed: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Source is not open")]
    NotOpen,
}

/// Domain interface for frame acquisition.
///
/// The lifecycle is `open` once, `acquire` repeatedly, `close` exactly
/// once at the end; `close` is idempotent. Every acquired frame is
/// 3-channel RGB at the size `open` reported.
pub trait FrameSource {
    fn open(&mut self) -> Result<SourceInfo, CaptureError>;

    fn acquire(&mut self) -> Result<Frame, CaptureError>;

    fn close(&mut self);
}
