use std::time::{Duration, Instant};

use crate::shared::config::WatchConfig;

use super::alert::{Alert, AlertKind};
use super::track::{Identity, Track};

/// Per-track alert throttle.
///
/// New unknown tracks always alert. An existing unknown track alerts again
/// only once the cooldown has passed since its last alert. Known tracks
/// alert once, on creation, and only when `alert_on_known` is set.
#[derive(Clone, Debug)]
pub struct AlertGate {
    cooldown: Duration,
    alert_on_known: bool,
}

impl AlertGate {
    pub fn new(cooldown: Duration, alert_on_known: bool) -> Self {
        Self {
            cooldown,
            alert_on_known,
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.alert_cooldown(), config.alert_on_known)
    }

    /// What alert, if any, this sighting of `track` deserves. Pure.
    pub fn should_alert(&self, track: &Track, is_new: bool, now: Instant) -> Option<AlertKind> {
        match track.identity() {
            Identity::Unknown(_) if is_new => Some(AlertKind::NewUnknown),
            Identity::Unknown(_) => {
                let cooled = match track.last_alert() {
                    Some(last) => now.saturating_duration_since(last) >= self.cooldown,
                    None => true,
                };
                cooled.then_some(AlertKind::RecurringUnknown)
            }
            Identity::Known(_) if is_new && self.alert_on_known => Some(AlertKind::NewKnown),
            Identity::Known(_) => None,
        }
    }

    /// Evaluates the gate and, when it opens, stamps `last_alert` on the
    /// track and returns the alert.
    pub fn check(&self, track: &mut Track, is_new: bool, now: Instant) -> Option<Alert> {
        let kind = self.should_alert(track, is_new, now)?;
        track.record_alert(now);
        Some(Alert {
            kind,
            track_id: track.id(),
            identity: track.identity(),
            bbox: track.bbox(),
            at: now,
        })
    }
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}
