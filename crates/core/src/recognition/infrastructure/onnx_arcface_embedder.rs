//! ArcFace face embedder using ONNX Runtime.
//!
//! Crops are resized to 112×112, normalized to `[-1, 1]` and fed as NCHW.
//! The raw output is L2-normalized before it leaves this module.

use std::path::Path;
use std::sync::Mutex;

use crate::recognition::domain::embedding::Embedding;
use crate::recognition::domain::face_embedder::{EmbeddingError, FaceEmbedder};
use crate::shared::onnx_session::{all_cores, load_session};

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;
const OUTPUT_DIM: usize = 512;

pub struct OnnxArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
    model_name: String,
}

impl OnnxArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, EmbeddingError> {
        let model_name = model_path.display().to_string();
        let session = load_session(model_path, Some(all_cores())).map_err(|reason| {
            EmbeddingError::ModelUnavailable {
                model: model_name.clone(),
                reason,
            }
        })?;

        log::info!("Loaded ArcFace embedder {model_name}");
        Ok(Self {
            session: Mutex::new(session),
            model_name,
        })
    }
}

impl FaceEmbedder for OnnxArcFaceEmbedder {
    fn embed_pixels(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Embedding, EmbeddingError> {
        let inference = |e: ort::Error| EmbeddingError::Inference(e.to_string());

        let tensor = preprocess(rgb, width, height);
        let input_value = ort::value::Tensor::from_array(tensor).map_err(inference)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbeddingError::Inference(format!("Lock poisoned: {e}")))?;
        let outputs = session.run(ort::inputs![input_value]).map_err(inference)?;
        let array = outputs[0].try_extract_array::<f32>().map_err(inference)?;
        let values = array
            .as_slice()
            .ok_or_else(|| EmbeddingError::Inference("Cannot get embedding slice".into()))?
            .to_vec();
        if values.len() != OUTPUT_DIM {
            return Err(EmbeddingError::Inference(format!(
                "expected {OUTPUT_DIM} values, model produced {}",
                values.len()
            )));
        }
        Embedding::from_raw(values)
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        OUTPUT_DIM
    }
}

/// Resize crop to 112x112, normalize, NCHW layout.
fn preprocess(rgb_data: &[u8], width: u32, height: u32) -> ndarray::Array4<f32> {
    let src_w = width.max(1) as usize;
    let src_h = height.max(1) as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * 3;
            if offset + 2 < rgb_data.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (rgb_data[offset + c] as f32 - NORM_MEAN) / NORM_STD;
                }
            }
        }
    }

    tensor
}
