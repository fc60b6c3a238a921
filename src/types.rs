use serde::{Deserialize, Serialize};

/// Identifier assigned by the upstream tracker to a detected person.
/// Assumed stable for as long as that person stays in view.
pub type TrackId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub notification: NotificationConfig,
    pub clip: ClipConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Sliding window depth in frames.
    pub frames_threshold: usize,
    /// Frame index at which evaluation begins. Expected to equal
    /// `frames_threshold`.
    pub begin_threshold: u64,
    /// Fraction of the window a violation must occupy before it qualifies.
    /// The firing count is floor(frames_percent_trig * frames_threshold).
    pub frames_percent_trig: f64,
    /// Minimum seconds between repeated alerts for the same
    /// (track id, label) pair.
    pub time_betw_trigs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub endpoint_url: String,
    pub cam_id: String,
    pub timeout_secs: u64,
    /// Hours added to UTC when stamping alert times (site-local clock).
    pub utc_offset_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Directory of recently captured frame images (.jpg).
    pub img_dir: String,
    /// Directory where evidence clips are written.
    pub vid_dir: String,
    /// Keep every Nth frame image when assembling a clip.
    pub sample_stride: usize,
    pub fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub input_dir: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// A fired violation, ready for dispatch and JSONL logging.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationEvent {
    pub track_id: TrackId,
    pub label: String,
    pub violation_id: u8,
    /// UNIX timestamp (seconds) at which the violation fired.
    pub fired_at: f64,
}
