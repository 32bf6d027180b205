use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::capture::frame_source::FrameSource;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::non_max_suppression::Deduplicator;
use crate::pipeline::event_sink::EventSink;
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::pipeline_executor::{
    PipelineComponents, PipelineError, PipelineExecutor, PipelineHandle,
};
use crate::pipeline::pipeline_stats::PipelineStats;
use crate::pipeline::recognize_frame_use_case::RecognizeFrameUseCase;
use crate::pipeline::snapshot::{snapshot_channel, SnapshotPublisher};
use crate::recognition::domain::face_embedder::{check_compatible, FaceEmbedder};
use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::matcher::Matcher;
use crate::shared::cancellation::CancellationToken;
use crate::shared::config::WatchConfig;
use crate::shared::frame::Frame;
use crate::shared::recency_queue::{recency_queue, Pop, PushOutcome, RecencyReceiver, RecencySender};
use crate::tracking::domain::alert::Alert;
use crate::tracking::domain::alert_gate::AlertGate;
use crate::tracking::domain::tracker::{FrameObservations, Tracker, TrackerSettings};

/// Capacity of the queues behind the recognition stage.
const DOWNSTREAM_CAPACITY: usize = 64;

/// What the tracker loop hands to the dispatch loop.
enum Outgoing {
    Alert(Alert),
    Event(PipelineEvent),
}

/// Runs each stage on its own thread, connected by recency queues.
///
/// Layout: `capture → recognize ×N → track/alert → dispatch → sink`
///
/// Cancelling stops the capture loop and the recognizers; the tracker and
/// dispatch loops then drain what is already queued and exit as their
/// inputs close.
pub struct ThreadedPipelineExecutor {
    downstream_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            downstream_capacity: DOWNSTREAM_CAPACITY,
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn start(
        &self,
        components: PipelineComponents,
        config: &WatchConfig,
    ) -> Result<PipelineHandle, PipelineError> {
        config.validate()?;
        let PipelineComponents {
            camera,
            capture,
            detectors,
            embedder,
            gallery,
            sink,
        } = components;
        if detectors.is_empty() {
            return Err(PipelineError::NoDetector);
        }
        let recognizers = detectors.len();
        check_compatible(embedder.as_ref(), gallery.snapshot().entries())?;

        let source = FrameSource::open(camera, &capture, config.capture_backoff())?;
        let stream = source.info().clone();

        let cancel = CancellationToken::new();
        let stats = Arc::new(PipelineStats::new());
        let (publisher, reader) = snapshot_channel(config.recent_alert_capacity);
        let mut handle = PipelineHandle::new(cancel.clone(), reader, Arc::clone(&stats), stream);

        let (frame_tx, frame_rx) = recency_queue::<Frame>(config.queue_capacity);
        let (result_tx, result_rx) = recency_queue::<FrameObservations>(self.downstream_capacity);
        let (out_tx, out_rx) = recency_queue::<Outgoing>(self.downstream_capacity);
        let timeout = config.pop_timeout();

        // Spawned downstream first. Every stage exits once its input closes,
        // so an early return here unwinds whatever already started.
        handle.add_worker(
            "dispatch".to_string(),
            spawn_named("dispatch", {
                let stats = Arc::clone(&stats);
                let publisher = publisher.clone();
                move || run_dispatch_loop(out_rx, sink, publisher, &stats, timeout)
            })?,
        );

        handle.add_worker(
            "tracker".to_string(),
            spawn_named("tracker", {
                let stats = Arc::clone(&stats);
                let tracker = Tracker::new(TrackerSettings::from_config(config));
                let gate = AlertGate::from_config(config);
                move || run_tracker_loop(result_rx, out_tx, tracker, gate, publisher, &stats, timeout)
            })?,
        );

        let deduplicator = Deduplicator::new(config.nms_iou_threshold);
        let matcher = Matcher::new(config.similarity_threshold);
        for (index, detector) in detectors.into_iter().enumerate() {
            let name = format!("recognize-{index}");
            log::info!("Starting {name} with detector {}", detector.name());
            let use_case = recognizer(detector, &deduplicator, &embedder, &matcher, &gallery);
            let worker = spawn_named(&name, {
                let frame_rx = frame_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                let stats = Arc::clone(&stats);
                move || run_recognize_loop(use_case, frame_rx, result_tx, cancel, &stats, timeout)
            })?;
            handle.add_worker(name, worker);
        }
        // Recognizers hold the only result senders, so the tracker sees the
        // queue close once they are all gone.
        drop(result_tx);
        drop(frame_rx);

        let capture = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn({
                let cancel = cancel.clone();
                let stats = Arc::clone(&stats);
                move || source.run(frame_tx, cancel, stats)
            })
            .map_err(|source| PipelineError::Spawn {
                name: "capture".to_string(),
                source,
            })?;
        handle.set_capture(capture);

        log::info!(
            "Pipeline running: {} recognizer(s), queue capacity {}",
            recognizers,
            config.queue_capacity
        );
        Ok(handle)
    }
}

fn recognizer(
    detector: Box<dyn FaceDetector>,
    deduplicator: &Deduplicator,
    embedder: &Arc<dyn FaceEmbedder>,
    matcher: &Matcher,
    gallery: &Arc<Gallery>,
) -> RecognizeFrameUseCase {
    RecognizeFrameUseCase::new(
        detector,
        deduplicator.clone(),
        Arc::clone(embedder),
        matcher.clone(),
        Arc::clone(gallery),
    )
}

fn spawn_named(
    name: &str,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, PipelineError> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|source| PipelineError::Spawn {
            name: name.to_string(),
            source,
        })
}

/// Pulls the freshest frame, recognizes it, and forwards the result.
/// A failed frame is logged and skipped; it is never retried.
fn run_recognize_loop(
    mut use_case: RecognizeFrameUseCase,
    frame_rx: RecencyReceiver<Frame>,
    result_tx: RecencySender<FrameObservations>,
    cancel: CancellationToken,
    stats: &PipelineStats,
    timeout: Duration,
) {
    while !cancel.is_cancelled() {
        let frame = match frame_rx.pop(timeout) {
            Pop::Item(frame) => frame,
            Pop::Empty => continue,
            Pop::Closed => break,
        };
        match use_case.execute(&frame, stats) {
            Ok(observations) => {
                stats.frame_processed();
                if result_tx.push(observations) == PushOutcome::EvictedOldest {
                    stats.stale_result();
                }
            }
            Err(e) => {
                stats.inference_failed();
                log::warn!("Skipping frame {}: {e}", frame.sequence());
            }
        }
    }
    log::debug!("Recognizer ({}) stopped", use_case.detector_name());
}

/// Owns the tracker: applies each frame's observations in sequence order,
/// runs the alert gate, expires idle tracks and publishes the active set.
/// Runs until every recognizer has gone and the queue is drained.
fn run_tracker_loop(
    result_rx: RecencyReceiver<FrameObservations>,
    out_tx: RecencySender<Outgoing>,
    mut tracker: Tracker,
    gate: AlertGate,
    publisher: SnapshotPublisher,
    stats: &PipelineStats,
    timeout: Duration,
) {
    let send = |item: Outgoing| {
        if out_tx.push(item) == PushOutcome::EvictedOldest {
            stats.event_dropped();
        }
    };

    loop {
        match result_rx.pop(timeout) {
            Pop::Item(frame) => apply_frame(&mut tracker, &gate, &frame, stats, &send),
            Pop::Empty => {}
            Pop::Closed => break,
        }

        for expired in tracker.sweep(Instant::now()) {
            stats.track_expired();
            send(Outgoing::Event(PipelineEvent::track_expired(&expired)));
        }
        publisher.publish_tracks(tracker.active_tracks().cloned().collect());
    }
    log::debug!("Tracker stopped with {} active track(s)", tracker.active_count());
}

fn apply_frame(
    tracker: &mut Tracker,
    gate: &AlertGate,
    frame: &FrameObservations,
    stats: &PipelineStats,
    send: &impl Fn(Outgoing),
) {
    let Some(resolutions) = tracker.resolve_frame(frame) else {
        stats.stale_result();
        log::debug!("Discarding stale result for frame {}", frame.sequence);
        return;
    };

    for resolution in resolutions {
        let Some(track) = tracker.get_mut(resolution.track_id) else {
            continue;
        };
        if resolution.created {
            stats.track_opened();
            send(Outgoing::Event(PipelineEvent::track_opened(track)));
            if let Some(visit) = PipelineEvent::visit(track) {
                send(Outgoing::Event(visit));
            }
        }
        if let Some(alert) = gate.check(track, resolution.created, frame.captured_at) {
            stats.alert_emitted();
            log::info!("{:?} alert for {} ({})", alert.kind, alert.identity, alert.track_id);
            send(Outgoing::Alert(alert));
        }
    }
}

/// Delivers alerts and events to the sink and records recent alerts.
/// A sink that refuses an event costs that event only.
fn run_dispatch_loop(
    out_rx: RecencyReceiver<Outgoing>,
    sink: Arc<dyn EventSink>,
    publisher: SnapshotPublisher,
    stats: &PipelineStats,
    timeout: Duration,
) {
    loop {
        let event = match out_rx.pop(timeout) {
            Pop::Item(Outgoing::Alert(alert)) => {
                let event = PipelineEvent::alert(&alert);
                publisher.record_alert(alert);
                event
            }
            Pop::Item(Outgoing::Event(event)) => event,
            Pop::Empty => continue,
            Pop::Closed => break,
        };
        if let Err(e) = sink.push(&event) {
            stats.event_dropped();
            log::debug!("Event dropped: {e}");
        }
    }
}
