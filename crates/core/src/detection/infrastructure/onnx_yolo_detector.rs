/// YOLO-pose face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and decoding of boxes and
/// keypoints back into frame coordinates. Overlapping candidates are left in
/// place; deduplication is a separate pipeline stage.
use std::path::Path;

use crate::detection::domain::detection::{Detection, Landmarks};
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::shared::onnx_session::load_session;


/// Fallback input resolution when the model declares a dynamic shape.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    min_confidence: f64,
    input_size: u32,
    model_name: String,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model. The input resolution is read from the model's
    /// NCHW input shape, falling back to 640.
    pub fn new(model_path: &Path, min_confidence: f64) -> Result<Self, DetectionError> {
        let model_name = model_path.display().to_string();
        let session = load_session(model_path, None).map_err(|reason| {
            DetectionError::ModelUnavailable {
                model: model_name.clone(),
                reason,
            }
        })?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!("Loaded YOLO detector {model_name} (input {input_size}px)");
        Ok(Self {
            session,
            min_confidence,
            input_size,
            model_name,
        })
    }

    fn run(&mut self, frame: &Frame) -> Result<Vec<Detection>, String> {
        let letterboxed = letterbox(frame, self.input_size);

        let input_value =
            ort::value::Tensor::from_array(letterboxed.tensor.clone()).map_err(|e| e.to_string())?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| e.to_string())?;
        if outputs.len() == 0 {
            return Err("model produced no outputs".to_string());
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| e.to_string())?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| "output tensor is not contiguous".to_string())?;

        let layout = OutputLayout::from_shape(&shape)?;
        let mut detections = Vec::new();
        for i in 0..layout.num_dets {
            let row = layout.row(data, i);
            if let Some(det) = decode_row(&row, &letterboxed, self.min_confidence, frame) {
                detections.push(det);
            }
        }
        Ok(detections)
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        self.run(frame).map_err(|reason| DetectionError::Inference {
            sequence: frame.sequence(),
            reason,
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame into a `target_size`² NCHW tensor padded with
/// YOLO gray.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// YOLO exports either `[1, features, dets]` or `[1, dets, features]`.
struct OutputLayout {
    num_dets: usize,
    num_feats: usize,
    transposed: bool,
}

impl OutputLayout {
    fn from_shape(shape: &[usize]) -> Result<Self, String> {
        if shape.len() != 3 {
            return Err(format!("unexpected output shape {shape:?}"));
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        Ok(Self {
            num_dets,
            num_feats,
            transposed,
        })
    }

    fn row(&self, data: &[f32], i: usize) -> Vec<f32> {
        if self.transposed {
            (0..self.num_feats)
                .map(|f| data[f * self.num_dets + i])
                .collect()
        } else {
            data[i * self.num_feats..(i + 1) * self.num_feats].to_vec()
        }
    }
}

/// Row format: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn decode_row(
    row: &[f32],
    lb: &Letterboxed,
    min_confidence: f64,
    frame: &Frame,
) -> Option<Detection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_confidence {
        return None;
    }

    let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
    let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);
    let bbox = BoundingBox::from_corners(x1, y1, x2, y2).clamp_to(frame.width(), frame.height());
    if bbox.is_degenerate() {
        return None;
    }

    let mut det = Detection::new(bbox, conf, frame.sequence());
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        let mut pts = [(0.0f64, 0.0f64); 5];
        for (k, pt) in pts.iter_mut().enumerate() {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                *pt = lb.to_frame(row[base] as f64, row[base + 1] as f64);
            }
        }
        det = det.with_landmarks(Landmarks(pts));
    }
    Some(det)
}
