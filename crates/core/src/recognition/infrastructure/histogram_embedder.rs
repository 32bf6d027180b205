//! Hue-saturation histogram embedder.
//!
//! A model-free fallback that describes a face crop by its colour
//! distribution. Far weaker than a learned embedding, but deterministic and
//! cheap, which makes it the embedder of choice for simulations and when no
//! ArcFace model is available.

use crate::recognition::domain::embedding::Embedding;
use crate::recognition::domain::face_embedder::{EmbeddingError, FaceEmbedder};

const HUE_BINS: usize = 32;
const SAT_BINS: usize = 32;
const DIMENSION: usize = HUE_BINS * SAT_BINS;

#[derive(Clone, Copy, Debug, Default)]
pub struct HistogramEmbedder;

impl HistogramEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl FaceEmbedder for HistogramEmbedder {
    fn embed_pixels(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Embedding, EmbeddingError> {
        Embedding::from_raw(compute_histogram(rgb, width, height))
    }

    fn name(&self) -> &str {
        "hsv-histogram"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

fn compute_histogram(rgb_data: &[u8], width: u32, height: u32) -> Vec<f32> {
    let num_pixels = (width as usize) * (height as usize);
    let mut hist = vec![0.0f32; HUE_BINS * SAT_BINS];

    for px in rgb_data.chunks_exact(3).take(num_pixels) {
        let r = px[0] as f64 / 255.0;
        let g = px[1] as f64 / 255.0;
        let b = px[2] as f64 / 255.0;

        let (h, s, _v) = rgb_to_hsv(r, g, b);

        let h_bin = ((h / 360.0) * HUE_BINS as f64).min(HUE_BINS as f64 - 1.0) as usize;
        let s_bin = (s * SAT_BINS as f64).min(SAT_BINS as f64 - 1.0) as usize;

        hist[h_bin * SAT_BINS + s_bin] += 1.0;
    }

    hist
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if (max - r).abs() < f64::EPSILON {
        60.0 * (((g - b) / delta) % 6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}
