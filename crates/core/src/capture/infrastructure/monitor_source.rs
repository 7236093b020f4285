use crate::capture::domain::capture_region::CaptureRegion;
use crate::capture::domain::frame_source::{CaptureError, FrameSource, SourceInfo};
use crate::shared::frame::Frame;

/// Captures a centered square region of one monitor via `xcap`.
///
/// Monitors advertise their logical size, but on HiDPI displays the
/// captured image arrives in physical pixels. The crop region is
/// computed once against the advertised size and rescaled per capture
/// to whatever the screenshot actually measures, so the same relative
/// region is cut out either way.
pub struct MonitorSource {
    monitor_index: usize,
    box_size: u32,
    state: Option<MonitorState>,
    frames_read: usize,
}

struct MonitorState {
    monitor: xcap::Monitor,
    region: CaptureRegion,
    reported_width: u32,
    reported_height: u32,
}

impl MonitorSource {
    pub fn new(monitor_index: usize, box_size: u32) -> Self {
        Self {
            monitor_index,
            box_size,
            state: None,
            frames_read: 0,
        }
    }
}

impl FrameSource for MonitorSource {
    fn open(&mut self) -> Result<SourceInfo, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::MonitorEnumeration {
                reason: e.to_string(),
            })?;
        let count = monitors.len();
        if count == 0 {
            return Err(CaptureError::NoMonitors);
        }
        let Some(monitor) = monitors.into_iter().nth(self.monitor_index) else {
            return Err(CaptureError::MonitorOutOfRange {
                index: self.monitor_index,
                count,
            });
        };

        let enumeration_err = |e: xcap::XCapError| CaptureError::MonitorEnumeration {
            reason: e.to_string(),
        };
        let reported_width = monitor.width().map_err(enumeration_err)?;
        let reported_height = monitor.height().map_err(enumeration_err)?;
        let region = CaptureRegion::centered(reported_width, reported_height, self.box_size)?;
        let label = monitor
            .name()
            .unwrap_or_else(|_| format!("monitor {}", self.monitor_index));

        self.state = Some(MonitorState {
            monitor,
            region,
            reported_width,
            reported_height,
        });
        self.frames_read = 0;

        Ok(SourceInfo {
            width: region.width,
            height: region.height,
            label,
        })
    }

    fn acquire(&mut self) -> Result<Frame, CaptureError> {
        let Some(state) = self.state.as_ref() else {
            return Err(CaptureError::NotOpen);
        };

        let image = state
            .monitor
            .capture_image()
            .map_err(|e| CaptureError::AcquisitionFailed {
                reason: e.to_string(),
            })?;

        let region = scaled_region(
            state.region,
            (state.reported_width, state.reported_height),
            (image.width(), image.height()),
        );
        let pixels = crop_rgb(&image, region);
        let frame = Frame::new(pixels, region.width, region.height, 3, self.frames_read);
        self.frames_read += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!("monitor capture closed");
        }
    }
}

/// Rescales a region computed against the advertised monitor size onto
/// the size a capture actually came back with.
///
/// Coordinates round down, which keeps the scaled region inside the
/// captured image whenever the original region fit the advertised size.
fn scaled_region(region: CaptureRegion, reported: (u32, u32), actual: (u32, u32)) -> CaptureRegion {
    if reported == actual {
        return region;
    }
    let scale =
        |value: u32, from: u32, to: u32| (u64::from(value) * u64::from(to) / u64::from(from.max(1))) as u32;
    CaptureRegion {
        left: scale(region.left, reported.0, actual.0),
        top: scale(region.top, reported.1, actual.1),
        width: scale(region.width, reported.0, actual.0),
        height: scale(region.height, reported.1, actual.1),
    }
}

/// Cuts the region out of an RGBA screenshot as tightly-packed RGB.
fn crop_rgb(image: &image::RgbaImage, region: CaptureRegion) -> Vec<u8> {
    let img_width = image.width() as usize;
    let raw = image.as_raw();
    let left = region.left as usize;
    let top = region.top as usize;
    let width = region.width as usize;
    let height = region.height as usize;

    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let row_start = ((top + row) * img_width + left) * 4;
        for col in 0..width {
            let offset = row_start + col * 4;
            pixels.extend_from_slice(&raw[offset..offset + 3]);
        }
    }
    pixels
}
