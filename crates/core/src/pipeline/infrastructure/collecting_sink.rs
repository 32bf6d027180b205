use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::pipeline::event_sink::{EventSink, SinkError};
use crate::pipeline::events::PipelineEvent;

/// In-memory sink. Clones share the same buffer, so a test can keep one
/// handle and give the other to the pipeline.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
    unavailable: Arc<AtomicBool>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable, every push fails and nothing is stored.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn alerts(&self) -> Vec<PipelineEvent> {
        self.events().into_iter().filter(|e| e.is_alert()).collect()
    }
}

impl EventSink for CollectingSink {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SinkError::Unavailable("collecting sink offline".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::gallery::PersonId;

    #[test]
    fn test_clones_share_buffer() {
        let sink = CollectingSink::new();
        let handle = sink.clone();
        sink.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).unwrap();
        assert_eq!(handle.events().len(), 1);
        assert!(handle.alerts().is_empty());
    }

    #[test]
    fn test_unavailable_rejects() {
        let sink = CollectingSink::new();
        sink.set_available(false);
        assert!(sink.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).is_err());
        sink.set_available(true);
        assert!(sink.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).is_ok());
        assert_eq!(sink.events().len(), 1);
    }
}
