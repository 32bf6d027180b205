use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::pipeline::event_sink::{EventSink, SinkError};
use crate::pipeline::events::PipelineEvent;

/// Appends one JSON object per event to a file.
pub struct JsonLinesEventSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesEventSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for JsonLinesEventSink {
    fn push(&self, event: &PipelineEvent) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(event).map_err(|e| SinkError::Unavailable(e.to_string()))?;
        // A writer poisoned by a panicking thread is as good as closed.
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Unavailable("event log writer poisoned".to_string()))?;
        writeln!(writer, "{line}")
            .and_then(|()| writer.flush())
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::gallery::PersonId;
    use tempfile::TempDir;

    #[test]
    fn test_appends_one_line_per_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("events.jsonl");

        let sink = JsonLinesEventSink::open(&path).unwrap();
        sink.push(&PipelineEvent::enrolled(PersonId(1), "Ada")).unwrap();
        sink.push(&PipelineEvent::enrolled(PersonId(2), "Grace")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "enrolled");
        assert_eq!(lines[1]["name"], "Grace");
    }

    #[test]
    fn test_reopen_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.jsonl");
        JsonLinesEventSink::open(&path)
            .unwrap()
            .push(&PipelineEvent::enrolled(PersonId(1), "Ada"))
            .unwrap();
        JsonLinesEventSink::open(&path)
            .unwrap()
            .push(&PipelineEvent::enrolled(PersonId(2), "Grace"))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
