use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters shared by every pipeline worker.
///
/// Drops and failures the pipeline absorbs (evicted frames, skipped
/// inference, dropped sink events) are only ever visible here.
#[derive(Debug)]
pub struct PipelineStats {
    started_at: Instant,
    frames_captured: AtomicU64,
    frames_evicted: AtomicU64,
    capture_errors: AtomicU64,
    frames_processed: AtomicU64,
    inference_failures: AtomicU64,
    invalid_regions: AtomicU64,
    embedding_failures: AtomicU64,
    stale_results: AtomicU64,
    tracks_opened: AtomicU64,
    tracks_expired: AtomicU64,
    alerts_emitted: AtomicU64,
    events_dropped: AtomicU64,
}

/// Plain copy of the counters at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_evicted: u64,
    pub capture_errors: u64,
    pub frames_processed: u64,
    pub inference_failures: u64,
    pub invalid_regions: u64,
    pub embedding_failures: u64,
    pub stale_results: u64,
    pub tracks_opened: u64,
    pub tracks_expired: u64,
    pub alerts_emitted: u64,
    pub events_dropped: u64,
}

macro_rules! counters {
    ($($field:ident => $inc:ident),* $(,)?) => {
        impl PipelineStats {
            $(
                pub fn $inc(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*

            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    frames_captured => frame_captured,
    frames_evicted => frame_evicted,
    capture_errors => capture_error,
    frames_processed => frame_processed,
    inference_failures => inference_failed,
    invalid_regions => invalid_region,
    embedding_failures => embedding_failed,
    stale_results => stale_result,
    tracks_opened => track_opened,
    tracks_expired => track_expired,
    alerts_emitted => alert_emitted,
    events_dropped => event_dropped,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_captured: AtomicU64::new(0),
            frames_evicted: AtomicU64::new(0),
            capture_errors: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            invalid_regions: AtomicU64::new(0),
            embedding_failures: AtomicU64::new(0),
            stale_results: AtomicU64::new(0),
            tracks_opened: AtomicU64::new(0),
            tracks_expired: AtomicU64::new(0),
            alerts_emitted: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// End-of-run report, one counter per line.
    pub fn summary_string(&self) -> String {
        let s = self.snapshot();
        let secs = self.elapsed().as_secs_f64();
        let mut lines = vec![format!("Pipeline summary ({secs:.1}s):")];

        let rows = [
            ("frames captured", s.frames_captured),
            ("frames evicted", s.frames_evicted),
            ("capture errors", s.capture_errors),
            ("frames processed", s.frames_processed),
            ("inference failures", s.inference_failures),
            ("invalid regions", s.invalid_regions),
            ("embedding failures", s.embedding_failures),
            ("stale results", s.stale_results),
            ("tracks opened", s.tracks_opened),
            ("tracks expired", s.tracks_expired),
            ("alerts emitted", s.alerts_emitted),
            ("events dropped", s.events_dropped),
        ];
        for (label, value) in rows {
            lines.push(format!("  {label:20}: {value}"));
        }

        if s.frames_processed > 0 && secs > 0.0 {
            let fps = s.frames_processed as f64 / secs;
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }
        lines.join("\n")
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(PipelineStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_increments_are_visible_in_snapshot() {
        let stats = PipelineStats::new();
        stats.frame_captured();
        stats.frame_captured();
        stats.frame_evicted();
        stats.alert_emitted();
        let s = stats.snapshot();
        assert_eq!(s.frames_captured, 2);
        assert_eq!(s.frames_evicted, 1);
        assert_eq!(s.alerts_emitted, 1);
        assert_eq!(s.events_dropped, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(PipelineStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.frame_processed();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().frames_processed, 4000);
    }

    #[test]
    fn test_summary_lists_counters() {
        let stats = PipelineStats::new();
        stats.event_dropped();
        let summary = stats.summary_string();
        assert!(summary.contains("Pipeline summary"));
        assert!(summary.contains("events dropped"));
        assert!(summary.contains("frames evicted"));
    }

    #[test]
    fn test_summary_includes_fps_once_frames_processed() {
        let stats = PipelineStats::new();
        assert!(!stats.summary_string().contains("fps"));
        stats.frame_processed();
        std::thread::sleep(Duration::from_millis(5));
        assert!(stats.summary_string().contains("fps"));
    }
}
