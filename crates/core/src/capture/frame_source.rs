use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::pipeline_stats::PipelineStats;
use crate::shared::cancellation::CancellationToken;
use crate::shared::frame::Frame;
use crate::shared::recency_queue::{PushOutcome, RecencySender};
use crate::shared::stream_info::{CaptureSettings, StreamInfo};

use super::domain::camera_device::{CameraDevice, CaptureError};

/// Slice length for cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Owns a camera and feeds its frames into the recency queue.
///
/// Frames are numbered here, starting at 1 and increasing by one per
/// captured frame, so downstream stages can tell order and staleness.
pub struct FrameSource {
    camera: Box<dyn CameraDevice>,
    info: StreamInfo,
    next_sequence: u64,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl FrameSource {
    pub fn open(
        mut camera: Box<dyn CameraDevice>,
        settings: &CaptureSettings,
        backoff: (Duration, Duration),
    ) -> Result<Self, CaptureError> {
        let info = camera.open(settings)?;
        Ok(Self {
            camera,
            info,
            next_sequence: 1,
            backoff_initial: backoff.0,
            backoff_max: backoff.1.max(backoff.0),
        })
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Reads one frame and stamps it with the next sequence number.
    pub fn read(&mut self) -> Result<Frame, CaptureError> {
        let frame = self.camera.read()?;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(frame.with_sequence(sequence))
    }

    pub fn close(&mut self) {
        self.camera.close();
    }

    /// Capture loop. Runs until cancelled or the stream ends, pushing every
    /// frame without ever blocking on a full queue. Transient read errors
    /// back off exponentially and retry. Dropping `queue` on return closes
    /// it for the consumers.
    pub fn run(
        mut self,
        queue: RecencySender<Frame>,
        cancel: CancellationToken,
        stats: Arc<PipelineStats>,
    ) -> Result<(), CaptureError> {
        let mut backoff = self.backoff_initial;
        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            match self.read() {
                Ok(frame) => {
                    backoff = self.backoff_initial;
                    stats.frame_captured();
                    if queue.push(frame) == PushOutcome::EvictedOldest {
                        stats.frame_evicted();
                    }
                }
                Err(CaptureError::Transient(reason)) => {
                    stats.capture_error();
                    log::warn!("Camera read failed ({reason}), retrying in {backoff:?}");
                    sleep_unless_cancelled(backoff, &cancel);
                    backoff = (backoff * 2).min(self.backoff_max);
                }
                Err(CaptureError::EndOfStream) => {
                    log::info!("Capture stream ended");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        self.close();
        result
    }
}

fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) {
    let mut remaining = duration;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::synthetic_camera::{painted_frame, SyntheticCamera};
    use crate::shared::recency_queue::{recency_queue, Pop};
    use std::time::Instant;

    const NO_BACKOFF: (Duration, Duration) = (Duration::from_millis(1), Duration::from_millis(1));

    fn open(camera: SyntheticCamera) -> FrameSource {
        FrameSource::open(Box::new(camera), &CaptureSettings::default(), NO_BACKOFF).unwrap()
    }

    fn drain(rx: &crate::shared::recency_queue::RecencyReceiver<Frame>) -> Vec<u64> {
        let mut seqs = Vec::new();
        while let Pop::Item(frame) = rx.pop(Duration::from_millis(10)) {
            seqs.push(frame.sequence());
        }
        seqs
    }

    #[test]
    fn test_sequences_start_at_one_and_increase() {
        let mut source = open(SyntheticCamera::repeating(painted_frame(4, 4, &[]), 3));
        let seqs: Vec<u64> = (0..3).map(|_| source.read().unwrap().sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_open_failure_propagates() {
        let camera = SyntheticCamera::new().failing_open("busy");
        let result = FrameSource::open(Box::new(camera), &CaptureSettings::default(), NO_BACKOFF);
        assert!(matches!(result, Err(CaptureError::Open { .. })));
    }

    #[test]
    fn test_run_survives_transient_errors() {
        let frame = painted_frame(4, 4, &[]);
        let camera = SyntheticCamera::new()
            .then_frame(frame.clone())
            .then_fail("hiccup")
            .then_fail("hiccup")
            .then_frame(frame);
        let (tx, rx) = recency_queue(10);
        let stats = Arc::new(PipelineStats::new());

        open(camera)
            .run(tx, CancellationToken::new(), Arc::clone(&stats))
            .unwrap();

        assert_eq!(drain(&rx), vec![1, 2]);
        let s = stats.snapshot();
        assert_eq!(s.frames_captured, 2);
        assert_eq!(s.capture_errors, 2);
    }

    #[test]
    fn test_run_evicts_oldest_when_full() {
        let camera = SyntheticCamera::repeating(painted_frame(4, 4, &[]), 8);
        let (tx, rx) = recency_queue(3);
        let stats = Arc::new(PipelineStats::new());

        open(camera)
            .run(tx, CancellationToken::new(), Arc::clone(&stats))
            .unwrap();

        assert_eq!(drain(&rx), vec![6, 7, 8]);
        assert_eq!(stats.snapshot().frames_evicted, 5);
    }

    #[test]
    fn test_run_closes_queue_on_exit() {
        let (tx, rx) = recency_queue::<Frame>(2);
        open(SyntheticCamera::new())
            .run(tx, CancellationToken::new(), Arc::new(PipelineStats::new()))
            .unwrap();
        assert!(matches!(rx.pop(Duration::from_millis(10)), Pop::Closed));
    }

    #[test]
    fn test_cancel_stops_run() {
        let camera = SyntheticCamera::repeating(painted_frame(4, 4, &[]), 10_000)
            .with_interval(Duration::from_millis(1));
        let (tx, _rx) = recency_queue(2);
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            std::thread::spawn(move || open(camera).run(tx, cancel, Arc::new(PipelineStats::new())))
        };
        std::thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        cancel.cancel();
        handle.join().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_sleep_is_cancellable() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = Instant::now();
        sleep_unless_cancelled(Duration::from_secs(5), &cancel);
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
