pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Frames buffered between capture and recognition before the oldest is evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_NMS_IOU_THRESHOLD: f64 = 0.5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

pub const DEFAULT_UNKNOWN_LOOKBACK_MS: u64 = 5_000;
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_ALERT_COOLDOWN_MS: u64 = 30_000;

/// Unknown continuity gate, in multiples of the track's last box diagonal.
pub const DEFAULT_SPATIAL_GATE: f64 = 1.0;

pub const DEFAULT_POP_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_RECENT_ALERTS: usize = 50;
/// How often a running watcher re-reads the gallery store.
pub const DEFAULT_GALLERY_REFRESH_MS: u64 = 2_000;

pub const DEFAULT_RESOLUTION: (u32, u32) = (1280, 720);
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_DEVICE: &str = "/dev/video0";
