use super::frame_source::CaptureError;

/// A screen region in monitor coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// A `box_size` square centered on a monitor, corners floored:
    /// `left = width/2 - box/2`, `top = height/2 - box/2`.
    ///
    /// Rejects boxes larger than the monitor on either axis rather than
    /// silently shrinking them.
    pub fn centered(
        monitor_width: u32,
        monitor_height: u32,
        box_size: u32,
    ) -> Result<Self, CaptureError> {
        if box_size > monitor_width || box_size > monitor_height {
            return Err(CaptureError::RegionTooLarge {
                box_size,
                width: monitor_width,
                height: monitor_height,
            });
        }
        Ok(Self {
            left: monitor_width / 2 - box_size / 2,
            top: monitor_height / 2 - box_size / 2,
            width: box_size,
            height: box_size,
        })
    }
}
