use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::capture::domain::camera_device::{CameraDevice, CaptureError};
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::event_sink::EventSink;
use crate::pipeline::pipeline_stats::PipelineStats;
use crate::pipeline::snapshot::SnapshotReader;
use crate::recognition::domain::face_embedder::{EmbeddingError, FaceEmbedder};
use crate::recognition::domain::gallery::Gallery;
use crate::shared::cancellation::CancellationToken;
use crate::shared::config::{ConfigError, WatchConfig};
use crate::shared::stream_info::{CaptureSettings, StreamInfo};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no face detector configured")]
    NoDetector,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("gallery does not fit the embedder: {0}")]
    IncompatibleGallery(#[from] EmbeddingError),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} thread panicked")]
    WorkerPanicked(String),
}

/// The pluggable stages a pipeline run is assembled from.
pub struct PipelineComponents {
    pub camera: Box<dyn CameraDevice>,
    pub capture: CaptureSettings,
    /// One detector per recognition worker.
    pub detectors: Vec<Box<dyn FaceDetector>>,
    pub embedder: Arc<dyn FaceEmbedder>,
    pub gallery: Arc<Gallery>,
    pub sink: Arc<dyn EventSink>,
}

/// Abstracts how the capture → recognize → track → dispatch pipeline runs.
///
/// `start` returns once every stage is running; the pipeline then keeps
/// going until the stream ends or the handle is shut down.
pub trait PipelineExecutor: Send {
    fn start(
        &self,
        components: PipelineComponents,
        config: &WatchConfig,
    ) -> Result<PipelineHandle, PipelineError>;
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

/// Control surface of a running pipeline.
pub struct PipelineHandle {
    cancel: CancellationToken,
    snapshot: SnapshotReader,
    stats: Arc<PipelineStats>,
    stream: StreamInfo,
    workers: Vec<Worker>,
    capture: Option<JoinHandle<Result<(), CaptureError>>>,
}

impl PipelineHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        snapshot: SnapshotReader,
        stats: Arc<PipelineStats>,
        stream: StreamInfo,
    ) -> Self {
        Self {
            cancel,
            snapshot,
            stats,
            stream,
            workers: Vec::new(),
            capture: None,
        }
    }

    pub(crate) fn set_capture(&mut self, handle: JoinHandle<Result<(), CaptureError>>) {
        self.capture = Some(handle);
    }

    pub(crate) fn add_worker(&mut self, name: String, handle: JoinHandle<()>) {
        self.workers.push(Worker { name, handle });
    }

    pub fn snapshot(&self) -> SnapshotReader {
        self.snapshot.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream
    }

    /// Signals every stage to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once every stage has exited, e.g. after the stream ended.
    pub fn is_finished(&self) -> bool {
        let capture_done = match &self.capture {
            Some(handle) => handle.is_finished(),
            None => true,
        };
        capture_done && self.workers.iter().all(|w| w.handle.is_finished())
    }

    /// Cancels and waits for every stage to drain and exit.
    pub fn shutdown(self) -> Result<(), PipelineError> {
        self.cancel();
        self.wait()
    }

    /// Waits for every stage to exit on its own, reporting the first error.
    pub fn wait(mut self) -> Result<(), PipelineError> {
        let mut first_error: Option<PipelineError> = None;

        if let Some(capture) = self.capture.take() {
            match capture.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e.into());
                }
                Err(_) => {
                    first_error.get_or_insert(PipelineError::WorkerPanicked("capture".into()));
                }
            }
        }

        for worker in std::mem::take(&mut self.workers) {
            if worker.handle.join().is_err() {
                first_error.get_or_insert(PipelineError::WorkerPanicked(worker.name));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for PipelineHandle {
    /// A dropped handle stops the pipeline instead of leaving it running
    /// detached.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
