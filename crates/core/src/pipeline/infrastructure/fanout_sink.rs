use std::sync::Arc;

use crate::pipeline::event_sink::{EventSink, SinkError};
use crate::pipeline::events::PipelineEvent;

/// Forwards every event to each inner sink. One failing sink does not stop
/// the others; the first error is reported after all have been tried.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.push(event) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::infrastructure::collecting_sink::CollectingSink;
    use crate::recognition::domain::gallery::PersonId;

    #[test]
    fn test_delivers_to_every_sink_despite_failure() {
        let broken = CollectingSink::new();
        broken.set_available(false);
        let healthy = CollectingSink::new();
        let fanout = FanoutSink::new(vec![Arc::new(broken.clone()), Arc::new(healthy.clone())]);

        let result = fanout.push(&PipelineEvent::enrolled(PersonId(1), "Ada"));

        assert!(result.is_err());
        assert_eq!(healthy.events().len(), 1);
        assert!(broken.events().is_empty());
    }

    #[test]
    fn test_empty_fanout_accepts() {
        let fanout = FanoutSink::new(Vec::new());
        assert!(fanout.is_empty());
        assert!(fanout.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).is_ok());
    }
}
