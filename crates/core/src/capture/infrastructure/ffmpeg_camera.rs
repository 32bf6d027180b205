use crate::capture::domain::camera_device::{CameraDevice, CaptureError};
use crate::shared::frame::Frame;
use crate::shared::stream_info::{CaptureSettings, StreamInfo};

/// Live capture through ffmpeg-next (libavdevice + libavcodec).
///
/// `/dev/video*` paths open through the V4L2 input with the requested
/// `video_size` and `framerate`; anything else (RTSP/HTTP URLs, files) goes
/// through normal format probing. Decoded frames are converted to RGB24.
pub struct FfmpegCamera {
    state: Option<OpenStream>,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    flushing: bool,
}

// Safety: FfmpegCamera is only used from the capture thread.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new()
    }
}

fn open_error(device: &str, e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Open {
        device: device.to_string(),
        reason: e.to_string(),
    }
}

fn is_v4l2_device(device: &str) -> bool {
    device.starts_with("/dev/video")
}

fn open_input(settings: &CaptureSettings) -> Result<ffmpeg_next::format::context::Input, CaptureError> {
    let device = settings.device.as_str();
    let mut options = ffmpeg_next::Dictionary::new();

    if is_v4l2_device(device) {
        ffmpeg_next::device::register_all();
        options.set("video_size", &format!("{}x{}", settings.width, settings.height));
        options.set("framerate", &settings.fps.to_string());
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name().contains("video4linux2") || f.name() == "v4l2")
            .ok_or_else(|| open_error(device, "V4L2 input not available in this ffmpeg build"))?;
        ffmpeg_next::format::open_with(device, &ffmpeg_next::Format::Input(format), options)
            .map(|ctx| ctx.input())
            .map_err(|e| open_error(device, e))
    } else {
        ffmpeg_next::format::input_with_dictionary(device, options)
            .map_err(|e| open_error(device, e))
    }
}

impl CameraDevice for FfmpegCamera {
    fn open(&mut self, settings: &CaptureSettings) -> Result<StreamInfo, CaptureError> {
        let device = settings.device.as_str();
        ffmpeg_next::init().map_err(|e| open_error(device, e))?;

        let ictx = open_input(settings)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| open_error(device, "no video stream"))?;
        let video_stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            settings.fps as f64
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_error(device, e))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| open_error(device, e))?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| open_error(device, e))?;

        let info = StreamInfo {
            width,
            height,
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            device: settings.device.clone(),
        };
        log::info!(
            "Opened {} ({}x{} @ {:.1} fps, {})",
            info.device,
            info.width,
            info.height,
            info.fps,
            info.codec
        );

        self.state = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            flushing: false,
        });
        Ok(info)
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CaptureError::Transient("camera not opened".to_string()))?;

        loop {
            if let Some(frame) = state.try_receive()? {
                return Ok(frame);
            }
            if state.flushing {
                return Err(CaptureError::EndOfStream);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut state.ictx) {
                Ok(()) => {
                    if packet.stream() != state.video_stream_index {
                        continue;
                    }
                    state
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| CaptureError::Transient(e.to_string()))?;
                }
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = state.decoder.send_eof();
                    state.flushing = true;
                }
                Err(e) => return Err(CaptureError::Transient(e.to_string())),
            }
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl OpenStream {
    fn try_receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Transient(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, 0)))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
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
