use thiserror::Error;

use super::events::PipelineEvent;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

/// Receiver of tracked events, alerts and enrollments.
///
/// `push` must return promptly. A sink that cannot take the event right now
/// returns `Unavailable`; the caller counts the drop and moves on, it never
/// retries or waits.
pub trait EventSink: Send + Sync {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError>;
}

/// Discards every event. Used when no sink is configured.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn push(&self, _event: &PipelineEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
