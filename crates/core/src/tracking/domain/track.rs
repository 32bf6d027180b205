use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::recognition::domain::gallery::PersonId;
use crate::shared::bounding_box::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Process-wide label for a face that matched nobody. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnknownId(pub u64);

impl fmt::Display for UnknownId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    Known(PersonId),
    Unknown(UnknownId),
}

impl Identity {
    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Known(id) => id.fmt(f),
            Identity::Unknown(id) => id.fmt(f),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    Active,
    Expired,
}

/// One face followed across frames.
///
/// Only the tracker mutates tracks; everyone else sees clones.
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    identity: Identity,
    bbox: BoundingBox,
    first_seen: Instant,
    last_seen: Instant,
    last_alert: Option<Instant>,
    last_sequence: u64,
    hits: u64,
    state: TrackState,
}

impl Track {
    pub(crate) fn new(
        id: TrackId,
        identity: Identity,
        bbox: BoundingBox,
        seen_at: Instant,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            identity,
            bbox,
            first_seen: seen_at,
            last_seen: seen_at,
            last_alert: None,
            last_sequence: sequence,
            hits: 1,
            state: TrackState::Active,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Detections resolved to this track so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackState::Active
    }

    /// Records a new sighting. `last_seen` never moves backwards.
    pub(crate) fn observe(&mut self, bbox: BoundingBox, seen_at: Instant, sequence: u64) {
        self.bbox = bbox;
        self.last_seen = self.last_seen.max(seen_at);
        self.last_sequence = self.last_sequence.max(sequence);
        self.hits += 1;
    }

    pub(crate) fn record_alert(&mut self, at: Instant) {
        self.last_alert = Some(at);
    }

    pub(crate) fn expire(&mut self) {
        self.state = TrackState::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn track(at: Instant) -> Track {
        Track::new(
            TrackId(1),
            Identity::Unknown(UnknownId(1)),
            BoundingBox::new(0, 0, 10, 10),
            at,
            0,
        )
    }

    #[test]
    fn test_new_track_is_active() {
        let now = Instant::now();
        let t = track(now);
        assert!(t.is_active());
        assert_eq!(t.first_seen(), now);
        assert_eq!(t.hits(), 1);
        assert!(t.last_alert().is_none());
    }

    #[test]
    fn test_last_seen_never_decreases() {
        let t0 = Instant::now();
        let mut t = track(t0 + Duration::from_secs(5));
        t.observe(BoundingBox::new(5, 5, 10, 10), t0, 1);
        assert_eq!(t.last_seen(), t0 + Duration::from_secs(5));
        assert_eq!(t.bbox(), BoundingBox::new(5, 5, 10, 10));
        assert_eq!(t.hits(), 2);
    }

    #[test]
    fn test_expire() {
        let mut t = track(Instant::now());
        t.expire();
        assert_eq!(t.state(), TrackState::Expired);
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::Known(PersonId(3)).to_string(), "person-3");
        assert_eq!(Identity::Unknown(UnknownId(8)).to_string(), "unknown-8");
    }
}
