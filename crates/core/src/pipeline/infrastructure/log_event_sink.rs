use crate::pipeline::event_sink::{EventSink, SinkError};
use crate::pipeline::events::PipelineEvent;

/// Writes each event as a human-readable log line. Alerts log at `info`,
/// track bookkeeping at `debug`.
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        match event {
            PipelineEvent::Alert {
                kind,
                track_id,
                identity,
                bbox,
                ..
            } => log::info!(
                "ALERT {kind:?}: {identity} on {track_id} at ({}, {}) {}x{}",
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height
            ),
            PipelineEvent::TrackOpened {
                track_id, identity, ..
            } => log::debug!("{track_id} opened for {identity}"),
            PipelineEvent::Visit {
                person_id,
                track_id,
                ..
            } => log::info!("{person_id} seen ({track_id})"),
            PipelineEvent::TrackExpired {
                track_id,
                identity,
                hits,
                ..
            } => log::debug!("{track_id} ({identity}) expired after {hits} sightings"),
            PipelineEvent::Enrolled {
                person_id, name, ..
            } => log::info!("Enrolled {name} as {person_id}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::gallery::PersonId;

    #[test]
    fn test_never_fails() {
        let sink = LogEventSink;
        assert!(sink.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).is_ok());
    }
}
