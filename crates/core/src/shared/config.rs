use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Tunables for the whole recognition pipeline.
///
/// Durations are stored in milliseconds so the struct maps one-to-one onto
/// its JSON form; missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub queue_capacity: usize,
    pub min_confidence: f64,
    pub nms_iou_threshold: f64,
    pub similarity_threshold: f64,
    pub unknown_lookback_ms: u64,
    pub inactivity_timeout_ms: u64,
    pub alert_cooldown_ms: u64,
    pub alert_on_known: bool,
    /// `None` disables the spatial check on unknown-track continuity.
    pub spatial_gate: Option<f64>,
    pub recognition_workers: usize,
    pub pop_timeout_ms: u64,
    pub recent_alert_capacity: usize,
    pub capture_backoff_initial_ms: u64,
    pub capture_backoff_max_ms: u64,
    pub gallery_refresh_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            unknown_lookback_ms: DEFAULT_UNKNOWN_LOOKBACK_MS,
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
            alert_cooldown_ms: DEFAULT_ALERT_COOLDOWN_MS,
            alert_on_known: false,
            spatial_gate: Some(DEFAULT_SPATIAL_GATE),
            recognition_workers: 1,
            pop_timeout_ms: DEFAULT_POP_TIMEOUT_MS,
            recent_alert_capacity: DEFAULT_RECENT_ALERTS,
            capture_backoff_initial_ms: 100,
            capture_backoff_max_ms: 2_000,
            gallery_refresh_ms: DEFAULT_GALLERY_REFRESH_MS,
        }
    }
}

impl WatchConfig {
    /// Reads a JSON config file. Absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: WatchConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    expected: "between 0.0 and 1.0",
                    value: value.to_string(),
                })
            }
        }

        unit_interval("min_confidence", self.min_confidence)?;
        unit_interval("nms_iou_threshold", self.nms_iou_threshold)?;
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "similarity_threshold",
                expected: "between -1.0 and 1.0",
                value: self.similarity_threshold.to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "queue_capacity",
                expected: "at least 1",
                value: "0".into(),
            });
        }
        if self.recognition_workers == 0 {
            return Err(ConfigError::OutOfRange {
                field: "recognition_workers",
                expected: "at least 1",
                value: "0".into(),
            });
        }
        if self.pop_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "pop_timeout_ms",
                expected: "at least 1",
                value: "0".into(),
            });
        }
        if self.gallery_refresh_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "gallery_refresh_ms",
                expected: "at least 1",
                value: "0".into(),
            });
        }
        if let Some(gate) = self.spatial_gate {
            if gate.is_nan() || gate <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: "spatial_gate",
                    expected: "positive",
                    value: gate.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn unknown_lookback(&self) -> Duration {
        Duration::from_millis(self.unknown_lookback_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_millis(self.alert_cooldown_ms)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn gallery_refresh(&self) -> Duration {
        Duration::from_millis(self.gallery_refresh_ms)
    }

    pub fn capture_backoff(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.capture_backoff_initial_ms),
            Duration::from_millis(self.capture_backoff_max_ms.max(self.capture_backoff_initial_ms)),
        )
    }
}

/// Default location of the enrolled-identity file.
///
/// - macOS: `~/Library/Application Support/FaceWatch/gallery.json`
/// - Linux: `$XDG_DATA_HOME/FaceWatch/gallery.json` or `~/.local/share/...`
/// - Windows: `%APPDATA%/FaceWatch/gallery.json`
pub fn default_gallery_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("FaceWatch").join("gallery.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = WatchConfig::default();
        assert_eq!(config.unknown_lookback(), Duration::from_secs(5));
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(60));
        assert_eq!(config.alert_cooldown(), Duration::from_secs(30));
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.nms_iou_threshold, 0.5);
        assert!(!config.alert_on_known);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"alert_cooldown_ms": 1000, "spatial_gate": null}"#).unwrap();

        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config.alert_cooldown(), Duration::from_secs(1));
        assert_eq!(config.spatial_gate, None);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let result = WatchConfig::load(Path::new("/nonexistent/facewatch.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(WatchConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[rstest]
    #[case::confidence(WatchConfig { min_confidence: 1.5, ..WatchConfig::default() })]
    #[case::iou(WatchConfig { nms_iou_threshold: -0.1, ..WatchConfig::default() })]
    #[case::similarity(WatchConfig { similarity_threshold: 2.0, ..WatchConfig::default() })]
    #[case::queue(WatchConfig { queue_capacity: 0, ..WatchConfig::default() })]
    #[case::workers(WatchConfig { recognition_workers: 0, ..WatchConfig::default() })]
    #[case::gate(WatchConfig { spatial_gate: Some(0.0), ..WatchConfig::default() })]
    #[case::refresh(WatchConfig { gallery_refresh_ms: 0, ..WatchConfig::default() })]
    fn test_validate_rejects_out_of_range(#[case] config: WatchConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));
    }
}
