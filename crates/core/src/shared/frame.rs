use std::time::Instant;

use ndarray::ArrayView3;

use super::bounding_box::BoundingBox;

/// A single captured camera frame: contiguous RGB bytes in row-major order.
///
/// Carries the capture instant and a sequence number that increases
/// monotonically per capture session. Format conversion happens at the
/// device boundary only; the pipeline treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        Self::captured(data, width, height, channels, sequence, Instant::now())
    }

    pub fn captured(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        sequence: u64,
        captured_at: Instant,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
            captured_at,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Restamps a frame with the capture session's sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// The whole frame as a box, used when an image is already a face crop.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `region` (already clamped to the frame) into
    /// a tightly packed buffer.
    pub fn crop(&self, region: &BoundingBox) -> Vec<u8> {
        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let x = region.x.max(0) as usize;
        let y = region.y.max(0) as usize;
        let w = (region.width.max(0) as usize).min(self.width as usize - x.min(self.width as usize));
        let h = (region.height.max(0) as usize).min(self.height as usize - y.min(self.height as usize));

        let mut pixels = Vec::with_capacity(w * h * channels);
        for row in y..y + h {
            let start = row * stride + x * channels;
            pixels.extend_from_slice(&self.data[start..start + w * channels]);
        }
        pixels
    }
}
