use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::pipeline::event_sink::{EventSink, SinkError};
use crate::pipeline::events::PipelineEvent;

/// Hands events to another thread over a bounded channel without waiting.
/// A full or disconnected channel reports `Unavailable`.
pub struct ChannelEventSink {
    tx: Sender<PipelineEvent>,
}

impl ChannelEventSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Unavailable("event channel full".to_string()),
            TrySendError::Disconnected(_) => {
                SinkError::Unavailable("event channel disconnected".to_string())
            }
        })
    }
}
