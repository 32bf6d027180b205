use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::recognition::domain::gallery::PersonId;
use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::alert::{Alert, AlertKind};
use crate::tracking::domain::track::{Identity, Track, TrackId};

/// Everything the pipeline reports to the outside world.
///
/// Timestamps are wall-clock milliseconds since the Unix epoch, converted
/// from the monotonic instants used internally.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Alert {
        kind: AlertKind,
        track_id: TrackId,
        identity: Identity,
        bbox: BoundingBox,
        timestamp_ms: u64,
    },
    TrackOpened {
        track_id: TrackId,
        identity: Identity,
        bbox: BoundingBox,
        timestamp_ms: u64,
    },
    /// A known person came into view (a new track bound to them).
    Visit {
        person_id: PersonId,
        track_id: TrackId,
        timestamp_ms: u64,
    },
    TrackExpired {
        track_id: TrackId,
        identity: Identity,
        first_seen_ms: u64,
        last_seen_ms: u64,
        hits: u64,
    },
    Enrolled {
        person_id: PersonId,
        name: String,
        timestamp_ms: u64,
    },
}

impl PipelineEvent {
    pub fn alert(alert: &Alert) -> Self {
        PipelineEvent::Alert {
            kind: alert.kind,
            track_id: alert.track_id,
            identity: alert.identity,
            bbox: alert.bbox,
            timestamp_ms: epoch_millis(alert.at),
        }
    }

    pub fn track_opened(track: &Track) -> Self {
        PipelineEvent::TrackOpened {
            track_id: track.id(),
            identity: track.identity(),
            bbox: track.bbox(),
            timestamp_ms: epoch_millis(track.first_seen()),
        }
    }

    /// `None` unless the track is bound to a known person.
    pub fn visit(track: &Track) -> Option<Self> {
        match track.identity() {
            Identity::Known(person_id) => Some(PipelineEvent::Visit {
                person_id,
                track_id: track.id(),
                timestamp_ms: epoch_millis(track.first_seen()),
            }),
            Identity::Unknown(_) => None,
        }
    }

    pub fn track_expired(track: &Track) -> Self {
        PipelineEvent::TrackExpired {
            track_id: track.id(),
            identity: track.identity(),
            first_seen_ms: epoch_millis(track.first_seen()),
            last_seen_ms: epoch_millis(track.last_seen()),
            hits: track.hits(),
        }
    }

    pub fn enrolled(person_id: PersonId, name: &str) -> Self {
        PipelineEvent::Enrolled {
            person_id,
            name: name.to_string(),
            timestamp_ms: epoch_millis(Instant::now()),
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, PipelineEvent::Alert { .. })
    }
}

/// Maps a monotonic instant onto wall-clock epoch milliseconds.
pub fn epoch_millis(at: Instant) -> u64 {
    let now = SystemTime::now();
    let age = Instant::now().saturating_duration_since(at);
    now.checked_sub(age)
        .unwrap_or(now)
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
