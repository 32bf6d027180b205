//! Read-only view of the running pipeline for dashboards and tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::tracking::domain::alert::Alert;
use crate::tracking::domain::track::Track;

struct Shared {
    tracks: RwLock<Arc<Vec<Track>>>,
    alerts: Mutex<VecDeque<Alert>>,
    alert_capacity: usize,
}

/// Writer half, held by the pipeline's own loops.
#[derive(Clone)]
pub struct SnapshotPublisher {
    shared: Arc<Shared>,
}

/// Cheap to clone, safe to call from any thread. Nothing here can reach
/// back into the pipeline.
#[derive(Clone)]
pub struct SnapshotReader {
    shared: Arc<Shared>,
}

/// Creates a publisher/reader pair keeping up to `alert_capacity` recent
/// alerts.
pub fn snapshot_channel(alert_capacity: usize) -> (SnapshotPublisher, SnapshotReader) {
    let shared = Arc::new(Shared {
        tracks: RwLock::new(Arc::new(Vec::new())),
        alerts: Mutex::new(VecDeque::with_capacity(alert_capacity)),
        alert_capacity,
    });
    (
        SnapshotPublisher {
            shared: Arc::clone(&shared),
        },
        SnapshotReader { shared },
    )
}

impl SnapshotPublisher {
    /// Replaces the published set of active tracks.
    pub fn publish_tracks(&self, tracks: Vec<Track>) {
        let next = Arc::new(tracks);
        *self
            .shared
            .tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn record_alert(&self, alert: Alert) {
        if self.shared.alert_capacity == 0 {
            return;
        }
        let mut alerts = self
            .shared
            .alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if alerts.len() == self.shared.alert_capacity {
            alerts.pop_front();
        }
        alerts.push_back(alert);
    }
}

impl SnapshotReader {
    /// Active tracks as of the tracker's last published frame, by track id.
    pub fn active_tracks(&self) -> Arc<Vec<Track>> {
        Arc::clone(
            &self
                .shared
                .tracks
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Most recent alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.shared
            .alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::tracking::domain::alert::AlertKind;
    use crate::tracking::domain::track::{Identity, TrackId, UnknownId};
    use std::time::Instant;

    fn alert(track: u64) -> Alert {
        Alert {
            kind: AlertKind::NewUnknown,
            track_id: TrackId(track),
            identity: Identity::Unknown(UnknownId(track)),
            bbox: BoundingBox::new(0, 0, 10, 10),
            at: Instant::now(),
        }
    }

    fn track(id: u64) -> Track {
        Track::new(
            TrackId(id),
            Identity::Unknown(UnknownId(id)),
            BoundingBox::new(0, 0, 10, 10),
            Instant::now(),
            1,
        )
    }

    #[test]
    fn test_starts_empty() {
        let (_publisher, reader) = snapshot_channel(4);
        assert!(reader.active_tracks().is_empty());
        assert!(reader.recent_alerts().is_empty());
    }

    #[test]
    fn test_published_tracks_visible_to_reader() {
        let (publisher, reader) = snapshot_channel(4);
        let before = reader.active_tracks();
        publisher.publish_tracks(vec![track(1), track(2)]);

        assert!(before.is_empty());
        let ids: Vec<TrackId> = reader.active_tracks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![TrackId(1), TrackId(2)]);
    }

    #[test]
    fn test_recent_alerts_ring_drops_oldest() {
        let (publisher, reader) = snapshot_channel(2);
        for id in 1..=3 {
            publisher.record_alert(alert(id));
        }
        let ids: Vec<TrackId> = reader.recent_alerts().iter().map(|a| a.track_id).collect();
        assert_eq!(ids, vec![TrackId(2), TrackId(3)]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let (publisher, reader) = snapshot_channel(0);
        publisher.record_alert(alert(1));
        assert!(reader.recent_alerts().is_empty());
    }

    #[test]
    fn test_reader_is_shareable_across_threads() {
        let (publisher, reader) = snapshot_channel(8);
        let handle = {
            let reader = reader.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let n = reader.active_tracks().len();
                    assert!(n == 0 || n == 3);
                }
            })
        };
        for _ in 0..100 {
            publisher.publish_tracks(vec![track(1), track(2), track(3)]);
        }
        handle.join().unwrap();
    }
}
