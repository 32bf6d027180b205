use std::time::Instant;

use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;

use super::track::{Identity, TrackId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    NewUnknown,
    RecurringUnknown,
    NewKnown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub track_id: TrackId,
    pub identity: Identity,
    pub bbox: BoundingBox,
    pub at: Instant,
}
