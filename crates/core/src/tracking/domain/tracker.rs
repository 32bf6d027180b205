//! Track state machine.
//!
//! The tracker owns the set of live tracks outright. It is driven by one
//! thread (the tracker loop) and hands out clones, so no other stage can
//! mutate a track.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use crate::recognition::domain::matcher::MatchOutcome;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::WatchConfig;

use super::track::{Identity, Track, TrackId, UnknownId};

/// One surviving detection of a frame together with its match outcome.
#[derive(Clone, Debug)]
pub struct Observation {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub outcome: MatchOutcome,
}

/// Everything recognized in one frame, in deduplicated (confidence) order.
#[derive(Clone, Debug)]
pub struct FrameObservations {
    pub sequence: u64,
    pub captured_at: Instant,
    pub observations: Vec<Observation>,
}

/// Where one observation ended up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub track_id: TrackId,
    pub identity: Identity,
    /// True when this observation opened the track.
    pub created: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackerSettings {
    /// How far back an unknown track may have been seen to be continued.
    pub unknown_lookback: Duration,
    pub inactivity_timeout: Duration,
    /// Maximum center distance for unknown continuity, in multiples of the
    /// track's last box diagonal. `None` uses the time window alone.
    pub spatial_gate: Option<f64>,
}

impl TrackerSettings {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            unknown_lookback: config.unknown_lookback(),
            inactivity_timeout: config.inactivity_timeout(),
            spatial_gate: config.spatial_gate,
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

pub struct Tracker {
    settings: TrackerSettings,
    tracks: BTreeMap<TrackId, Track>,
    next_track: u64,
    next_unknown: u64,
    last_sequence: Option<u64>,
}

impl Tracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            tracks: BTreeMap::new(),
            next_track: 1,
            next_unknown: 1,
            last_sequence: None,
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn active_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn active_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// Resolves every observation of one frame to a track.
    ///
    /// Frames must arrive in sequence order; a frame at or behind the last
    /// one applied is stale and returns `None` without touching any track.
    pub fn resolve_frame(&mut self, frame: &FrameObservations) -> Option<Vec<Resolution>> {
        if self.last_sequence.is_some_and(|last| frame.sequence <= last) {
            return None;
        }
        self.last_sequence = Some(frame.sequence);

        let mut claimed: HashSet<TrackId> = HashSet::new();
        let resolutions = frame
            .observations
            .iter()
            .map(|obs| match obs.outcome {
                MatchOutcome::Known { person_id, .. } => self.resolve_known(
                    Identity::Known(person_id),
                    obs,
                    frame,
                    &mut claimed,
                ),
                MatchOutcome::Unknown => self.resolve_unknown(obs, frame, &mut claimed),
            })
            .collect();
        Some(resolutions)
    }

    fn resolve_known(
        &mut self,
        identity: Identity,
        obs: &Observation,
        frame: &FrameObservations,
        claimed: &mut HashSet<TrackId>,
    ) -> Resolution {
        let existing = self
            .tracks
            .values_mut()
            .find(|t| t.identity() == identity);

        match existing {
            Some(track) => {
                // A second sighting of the same person in one frame joins the
                // same track but leaves the first (higher-confidence) box.
                if claimed.insert(track.id()) {
                    track.observe(obs.bbox, frame.captured_at, frame.sequence);
                }
                Resolution {
                    track_id: track.id(),
                    identity,
                    created: false,
                }
            }
            None => {
                let id = self.open(identity, obs, frame);
                claimed.insert(id);
                Resolution {
                    track_id: id,
                    identity,
                    created: true,
                }
            }
        }
    }

    fn resolve_unknown(
        &mut self,
        obs: &Observation,
        frame: &FrameObservations,
        claimed: &mut HashSet<TrackId>,
    ) -> Resolution {
        let lookback = self.settings.unknown_lookback;
        let gate = self.settings.spatial_gate;

        let nearest = self
            .tracks
            .values()
            .filter(|t| !t.identity().is_known() && !claimed.contains(&t.id()))
            .filter(|t| frame.captured_at.saturating_duration_since(t.last_seen()) <= lookback)
            .map(|t| (t.id(), t.bbox().center_distance(&obs.bbox), t.bbox().diagonal()))
            .filter(|(_, distance, diagonal)| match gate {
                Some(factor) => *distance <= factor * diagonal,
                None => true,
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _, _)| id);

        if let Some(id) = nearest {
            if let Some(track) = self.tracks.get_mut(&id) {
                track.observe(obs.bbox, frame.captured_at, frame.sequence);
                claimed.insert(id);
                return Resolution {
                    track_id: id,
                    identity: track.identity(),
                    created: false,
                };
            }
        }

        let identity = Identity::Unknown(UnknownId(self.next_unknown));
        self.next_unknown += 1;
        let id = self.open(identity, obs, frame);
        claimed.insert(id);
        Resolution {
            track_id: id,
            identity,
            created: true,
        }
    }

    fn open(&mut self, identity: Identity, obs: &Observation, frame: &FrameObservations) -> TrackId {
        let id = TrackId(self.next_track);
        self.next_track += 1;
        log::debug!("Opened {id} for {identity}");
        self.tracks.insert(
            id,
            Track::new(id, identity, obs.bbox, frame.captured_at, frame.sequence),
        );
        id
    }

    /// Expires every track idle for longer than the inactivity timeout and
    /// removes it from the active set. Returns the expired tracks.
    pub fn sweep(&mut self, now: Instant) -> Vec<Track> {
        let timeout = self.settings.inactivity_timeout;
        let stale: Vec<TrackId> = self
            .tracks
            .values()
            .filter(|t| now.saturating_duration_since(t.last_seen()) > timeout)
            .map(|t| t.id())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.tracks.remove(&id))
            .map(|mut track| {
                track.expire();
                log::debug!("Expired {} ({})", track.id(), track.identity());
                track
            })
            .collect()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::gallery::PersonId;
    use crate::tracking::domain::track::TrackState;

    fn unknown(x: i32, y: i32) -> Observation {
        Observation {
            bbox: BoundingBox::new(x, y, 50, 50),
            confidence: 0.9,
            outcome: MatchOutcome::Unknown,
        }
    }

    fn known(person: u64, x: i32) -> Observation {
        Observation {
            bbox: BoundingBox::new(x, 0, 50, 50),
            confidence: 0.9,
            outcome: MatchOutcome::Known {
                person_id: PersonId(person),
                similarity: 0.8,
            },
        }
    }

    fn frame(sequence: u64, at: Instant, observations: Vec<Observation>) -> FrameObservations {
        FrameObservations {
            sequence,
            captured_at: at,
            observations,
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_three_separate_unknowns_make_three_tracks() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let res = tracker
            .resolve_frame(&frame(
                1,
                t0,
                vec![unknown(0, 0), unknown(200, 0), unknown(400, 0)],
            ))
            .unwrap();
        assert_eq!(res.len(), 3);
        assert!(res.iter().all(|r| r.created));
        assert_eq!(tracker.active_count(), 3);
    }

    #[test]
    fn test_known_person_reuses_track() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let first = tracker.resolve_frame(&frame(1, t0, vec![known(7, 0)])).unwrap()[0];
        let second = tracker
            .resolve_frame(&frame(2, t0 + secs(20), vec![known(7, 300)]))
            .unwrap()[0];

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.track_id, second.track_id);
        assert_eq!(second.identity, Identity::Known(PersonId(7)));
        let track = tracker.get(first.track_id).unwrap();
        assert_eq!(track.bbox().x, 300);
        assert_eq!(track.last_seen(), t0 + secs(20));
    }

    #[test]
    fn test_same_person_twice_in_one_frame_keeps_first_box() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let res = tracker
            .resolve_frame(&frame(1, t0, vec![known(7, 0), known(7, 300)]))
            .unwrap();
        assert_eq!(res[0].track_id, res[1].track_id);
        assert_eq!(tracker.active_count(), 1);
        assert_eq!(tracker.get(res[0].track_id).unwrap().bbox().x, 0);
    }

    #[test]
    fn test_unknown_continues_within_lookback() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let a = tracker.resolve_frame(&frame(1, t0, vec![unknown(100, 100)])).unwrap()[0];
        let b = tracker
            .resolve_frame(&frame(2, t0 + secs(3), vec![unknown(102, 101)]))
            .unwrap()[0];
        assert_eq!(a.track_id, b.track_id);
        assert!(!b.created);
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_unknown_after_lookback_gets_new_id() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let a = tracker.resolve_frame(&frame(1, t0, vec![unknown(100, 100)])).unwrap()[0];
        let b = tracker
            .resolve_frame(&frame(2, t0 + secs(6), vec![unknown(100, 100)]))
            .unwrap()[0];
        assert_ne!(a.track_id, b.track_id);
        assert!(b.created);
        assert_eq!(b.identity, Identity::Unknown(UnknownId(2)));
    }

    #[test]
    fn test_spatial_gate_separates_distant_unknowns() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let a = tracker.resolve_frame(&frame(1, t0, vec![unknown(0, 0)])).unwrap()[0];
        let b = tracker
            .resolve_frame(&frame(2, t0 + secs(1), vec![unknown(600, 400)]))
            .unwrap()[0];
        assert_ne!(a.track_id, b.track_id);
    }

    #[test]
    fn test_without_spatial_gate_time_window_alone_decides() {
        let t0 = Instant::now();
        let mut tracker = Tracker::new(TrackerSettings {
            spatial_gate: None,
            ..TrackerSettings::default()
        });
        let a = tracker.resolve_frame(&frame(1, t0, vec![unknown(0, 0)])).unwrap()[0];
        let b = tracker
            .resolve_frame(&frame(2, t0 + secs(1), vec![unknown(600, 400)]))
            .unwrap()[0];
        assert_eq!(a.track_id, b.track_id);
    }

    #[test]
    fn test_nearest_unknown_track_wins() {
        let t0 = Instant::now();
        let mut tracker = Tracker::new(TrackerSettings {
            spatial_gate: None,
            ..TrackerSettings::default()
        });
        let res = tracker
            .resolve_frame(&frame(1, t0, vec![unknown(0, 0), unknown(300, 0)]))
            .unwrap();
        let next = tracker
            .resolve_frame(&frame(2, t0 + secs(1), vec![unknown(290, 0)]))
            .unwrap();
        assert_eq!(next[0].track_id, res[1].track_id);
    }

    #[test]
    fn test_stale_frame_is_rejected() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        tracker.resolve_frame(&frame(5, t0, vec![unknown(0, 0)])).unwrap();
        assert!(tracker.resolve_frame(&frame(4, t0, vec![unknown(0, 0)])).is_none());
        assert!(tracker.resolve_frame(&frame(5, t0, vec![unknown(0, 0)])).is_none());
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_unknown_ids_increase_and_are_never_reused() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        let mut seen = Vec::new();
        for i in 0..5u64 {
            let at = t0 + secs(i * 100);
            let res = tracker.resolve_frame(&frame(i + 1, at, vec![unknown(0, 0)])).unwrap();
            if let Identity::Unknown(UnknownId(n)) = res[0].identity {
                seen.push(n);
            }
            // Everything from the previous round has expired by now.
            tracker.sweep(at + secs(61));
            assert_eq!(tracker.active_count(), 0);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sweep_expires_idle_tracks() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        tracker.resolve_frame(&frame(1, t0, vec![unknown(0, 0)])).unwrap();
        tracker
            .resolve_frame(&frame(2, t0 + secs(30), vec![known(1, 400)]))
            .unwrap();

        let expired = tracker.sweep(t0 + secs(61));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].state(), TrackState::Expired);
        assert_eq!(tracker.active_count(), 1);
    }

    #[test]
    fn test_sweep_keeps_track_exactly_at_timeout() {
        let t0 = Instant::now();
        let mut tracker = Tracker::default();
        tracker.resolve_frame(&frame(1, t0, vec![unknown(0, 0)])).unwrap();
        assert!(tracker.sweep(t0 + secs(60)).is_empty());
    }
}
