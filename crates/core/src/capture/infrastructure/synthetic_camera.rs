use std::collections::VecDeque;
use std::time::Duration;

use crate::capture::domain::camera_device::{CameraDevice, CaptureError};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::shared::stream_info::{CaptureSettings, StreamInfo};

const BACKGROUND: u8 = 96;

#[derive(Clone, Debug)]
enum Step {
    Frame(Frame),
    Fail(String),
}

/// Scripted camera for simulations and tests.
///
/// Plays back a fixed list of frames and read failures, then reports
/// `EndOfStream`. An optional interval paces reads like a real device.
#[derive(Clone, Debug, Default)]
pub struct SyntheticCamera {
    steps: VecDeque<Step>,
    interval: Option<Duration>,
    fail_open: Option<String>,
    opened: bool,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` copies of `frame`.
    pub fn repeating(frame: Frame, count: usize) -> Self {
        let mut camera = Self::new();
        for _ in 0..count {
            camera = camera.then_frame(frame.clone());
        }
        camera
    }

    pub fn then_frame(mut self, frame: Frame) -> Self {
        self.steps.push_back(Step::Frame(frame));
        self
    }

    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fail(reason.into()));
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn failing_open(mut self, reason: impl Into<String>) -> Self {
        self.fail_open = Some(reason.into());
        self
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, settings: &CaptureSettings) -> Result<StreamInfo, CaptureError> {
        if let Some(reason) = &self.fail_open {
            return Err(CaptureError::Open {
                device: settings.device.clone(),
                reason: reason.clone(),
            });
        }
        self.opened = true;
        let (width, height) = self
            .steps
            .iter()
            .find_map(|s| match s {
                Step::Frame(f) => Some((f.width(), f.height())),
                Step::Fail(_) => None,
            })
            .unwrap_or((settings.width, settings.height));
        Ok(StreamInfo {
            width,
            height,
            fps: settings.fps as f64,
            codec: "synthetic".to_string(),
            device: settings.device.clone(),
        })
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if !self.opened {
            return Err(CaptureError::Transient("camera not opened".to_string()));
        }
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        match self.steps.pop_front() {
            // Re-stamp so the capture instant is the read time.
            Some(Step::Frame(f)) => Ok(Frame::new(
                f.data().to_vec(),
                f.width(),
                f.height(),
                f.channels(),
                0,
            )),
            Some(Step::Fail(reason)) => Err(CaptureError::Transient(reason)),
            None => Err(CaptureError::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

/// A gray RGB frame with solid-colour rectangles standing in for faces.
pub fn painted_frame(width: u32, height: u32, faces: &[(BoundingBox, [u8; 3])]) -> Frame {
    let w = width as usize;
    let mut data = vec![BACKGROUND; w * height as usize * 3];
    for (bbox, colour) in faces {
        let region = bbox.clamp_to(width, height);
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let offset = (y as usize * w + x as usize) * 3;
                data[offset..offset + 3].copy_from_slice(colour);
            }
        }
    }
    Frame::new(data, width, height, 3, 0)
}
