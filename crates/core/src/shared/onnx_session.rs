//! ONNX Runtime session setup shared by the detector and the embedder.

use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Hardware acceleration for the current platform. CoreML on macOS and
/// DirectML on Windows; ONNX Runtime falls back to CPU when the provider
/// cannot be registered. Elsewhere only the CPU provider is used.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Opens `model_path` as an inference session. `intra_threads` pins the
/// per-op thread count; `None` leaves ONNX Runtime's default.
///
/// Errors are returned as text so each caller can wrap them in its own
/// `ModelUnavailable` variant.
pub fn load_session(model_path: &Path, intra_threads: Option<usize>) -> Result<Session, String> {
    if !model_path.exists() {
        return Err("file not found".to_string());
    }
    let builder = Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .map_err(|e| e.to_string())?;
    let builder = match intra_threads {
        Some(n) => builder
            .with_inter_threads(1)
            .and_then(|b| b.with_intra_threads(n.max(1)))
            .map_err(|e| e.to_string())?,
        None => builder,
    };
    builder
        .with_execution_providers(preferred_execution_providers())
        .and_then(|b| b.commit_from_file(model_path))
        .map_err(|e| e.to_string())
}

/// One intra-op thread per available core.
pub fn all_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_reported() {
        let err = load_session(Path::new("/nonexistent/model.onnx"), None).unwrap_err();
        assert_eq!(err, "file not found");
    }

    #[test]
    fn test_all_cores_is_positive() {
        assert!(all_cores() >= 1);
    }
}
