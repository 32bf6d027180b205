pub mod histogram_embedder;
pub mod json_gallery_store;
pub mod memory_gallery_store;
pub mod onnx_arcface_embedder;
