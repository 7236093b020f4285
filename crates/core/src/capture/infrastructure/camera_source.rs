use crate::capture::domain::frame_source::{CaptureError, FrameSource, SourceInfo};
use crate::shared::frame::Frame;

/// Captures frames from a local camera via ffmpeg-next's device
/// demuxers (v4l2 on Linux, avfoundation on macOS, vfwcap on Windows).
///
/// Each decoded frame is scaled to tightly-packed RGB24 at the device's
/// native size; the device negotiates its own resolution and frame
/// rate. `box_size` is accepted for parity with monitor capture but not
/// yet applied: crop-to-box is a future extension, and today the whole
/// sensor frame flows through.
pub struct CameraSource {
    device_index: u32,
    box_size: u32,
    stream: Option<CameraStream>,
    frames_read: usize,
}

struct CameraStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

impl CameraSource {
    pub fn new(device_index: u32, box_size: u32) -> Self {
        Self {
            device_index,
            box_size,
            stream: None,
            frames_read: 0,
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<SourceInfo, CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::DeviceUnavailable {
            reason: e.to_string(),
        })?;

        let (demuxer, target) = input_target(self.device_index);
        let device_err = |e: ffmpeg_next::Error| CaptureError::DeviceUnavailable {
            reason: format!("{target}: {e}"),
        };

        let format = ffmpeg_next::device::input::video()
            .find(|f| format_matches(f.name(), demuxer))
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                reason: format!("input format {demuxer} is not available in this ffmpeg build"),
            })?;

        let opened = ffmpeg_next::format::open_with(
            &target,
            &format,
            ffmpeg_next::Dictionary::new(),
        )
        .map_err(device_err)?;
        let ictx = match opened {
            ffmpeg_next::format::Context::Input(input) => input,
            _ => {
                return Err(CaptureError::DeviceUnavailable {
                    reason: format!("{target}: opened as a non-input context"),
                })
            }
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                reason: format!("{target}: no video stream"),
            })?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(device_err)?;
        let decoder = codec_ctx.decoder().video().map_err(device_err)?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(CaptureError::DeviceUnavailable {
                reason: format!("{target}: device reported a {width}x{height} frame size"),
            });
        }

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(device_err)?;

        if self.box_size != 0 {
            log::debug!(
                "capture box {} requested; device frames stay at native {width}x{height}",
                self.box_size
            );
        }

        self.stream = Some(CameraStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        });
        self.frames_read = 0;

        Ok(SourceInfo {
            width,
            height,
            label: format!("{demuxer}:{target}"),
        })
    }

    fn acquire(&mut self) -> Result<Frame, CaptureError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::NotOpen);
        };

        loop {
            // Drain any frame the decoder already buffers before
            // feeding more packets.
            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if stream.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
                stream
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| CaptureError::AcquisitionFailed {
                        reason: e.to_string(),
                    })?;

                let pixels = extract_rgb_pixels(&rgb_frame, stream.width, stream.height);
                let frame = Frame::new(pixels, stream.width, stream.height, 3, self.frames_read);
                self.frames_read += 1;
                return Ok(frame);
            }

            let Some((packet_stream, packet)) = stream.ictx.packets().next() else {
                return Err(CaptureError::AcquisitionFailed {
                    reason: "device stream ended".into(),
                });
            };
            if packet_stream.index() != stream.stream_index {
                continue;
            }
            if stream.decoder.send_packet(&packet).is_err() {
                continue;
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("camera device closed");
        }
    }
}

/// Demuxer name and open target for a camera index on this platform.
fn input_target(index: u32) -> (&'static str, String) {
    #[cfg(target_os = "macos")]
    {
        ("avfoundation", format!("{index}"))
    }
    #[cfg(target_os = "windows")]
    {
        ("vfwcap", format!("{index}"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        ("v4l2", format!("/dev/video{index}"))
    }
}

/// Demuxer names can be comma-separated alias lists ("video4linux2,v4l2").
fn format_matches(name: &str, wanted: &str) -> bool {
    name.split(',').any(|n| n == wanted)
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may carry padding bytes at the end of each row
/// (stride > width*3); this strips the padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
