// src/notifier.rs
//
// Alert dispatch for fired violations. Each alert carries the camera id,
// site-local epoch timestamps, the violation type, and the URL of the
// evidence clip (empty while remote upload is disabled). Dispatch is
// best-effort: the caller logs failures and moves on.

use crate::clip;
use crate::types::{ClipConfig, NotificationConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Seconds of footage an alarm is considered to span.
const ALARM_SPAN_SECS: i64 = 10;

#[derive(Debug, Serialize)]
pub struct AlertPayload {
    pub alarms: Vec<Alarm>,
}

#[derive(Debug, Serialize)]
pub struct Alarm {
    #[serde(rename = "camId")]
    pub cam_id: String,
    pub time: i64,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "endTime")]
    pub end_time: i64,
    pub instance: u32,
    #[serde(rename = "violationType")]
    pub violation_type: u8,
    #[serde(rename = "videoUrl")]
    pub video_url: String,
}

pub struct NotificationClient {
    http_client: reqwest::Client,
    config: NotificationConfig,
    clip_config: ClipConfig,
}

impl NotificationClient {
    pub fn new(config: NotificationConfig, clip_config: ClipConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            config,
            clip_config,
        })
    }

    /// Assemble the evidence clip and deliver the alert for one fired
    /// violation. Clip failure downgrades to an alert without footage.
    pub async fn notify(&self, violation_id: u8) -> Result<()> {
        match clip::build_clip(
            Path::new(&self.clip_config.img_dir),
            Path::new(&self.clip_config.vid_dir),
            self.clip_config.sample_stride,
            self.clip_config.fps,
        ) {
            Ok((vid_name, vid_path)) => {
                info!("🎬 Evidence clip {} written to {}", vid_name, vid_path.display());
            }
            Err(e) => {
                warn!("Clip assembly failed: {:#}. Sending alert without footage.", e);
            }
        }
        // Remote upload is disabled; the endpoint accepts an empty URL.
        let video_url = String::new();

        let payload = self.build_alert(violation_id, video_url);
        let response = self
            .http_client
            .post(&self.config.endpoint_url)
            .json(&payload)
            .send()
            .await
            .context("alert request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("notification endpoint returned {}", response.status());
        }

        info!("📨 Alert delivered: violation_type={}", violation_id);
        Ok(())
    }

    fn build_alert(&self, violation_id: u8, video_url: String) -> AlertPayload {
        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.build_alert_at(violation_id, video_url, epoch_secs)
    }

    fn build_alert_at(&self, violation_id: u8, video_url: String, epoch_secs: i64) -> AlertPayload {
        let local_time = epoch_secs + self.config.utc_offset_hours * 60 * 60;
        AlertPayload {
            alarms: vec![Alarm {
                cam_id: self.config.cam_id.clone(),
                time: local_time,
                start_time: local_time,
                end_time: local_time + ALARM_SPAN_SECS,
                instance: 1,
                violation_type: violation_id,
                video_url,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NotificationClient {
        NotificationClient::new(
            NotificationConfig {
                enabled: true,
                endpoint_url: "http://localhost:8080/SendNotification".to_string(),
                cam_id: "1".to_string(),
                timeout_secs: 10,
                utc_offset_hours: 8,
            },
            ClipConfig {
                img_dir: "frames".to_string(),
                vid_dir: "clips".to_string(),
                sample_stride: 4,
                fps: 5.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_alert_timestamps_use_local_offset() {
        let payload = client().build_alert_at(5, String::new(), 1_000_000);

        assert_eq!(payload.alarms.len(), 1);
        let alarm = &payload.alarms[0];
        assert_eq!(alarm.time, 1_000_000 + 8 * 60 * 60);
        assert_eq!(alarm.start_time, alarm.time);
        assert_eq!(alarm.end_time, alarm.time + 10);
        assert_eq!(alarm.violation_type, 5);
        assert_eq!(alarm.instance, 1);
    }

    #[test]
    fn test_alert_serializes_with_endpoint_field_names() {
        let payload = client().build_alert_at(7, String::new(), 0);
        let json = serde_json::to_value(&payload).unwrap();

        let alarm = &json["alarms"][0];
        assert_eq!(alarm["camId"], "1");
        assert_eq!(alarm["violationType"], 7);
        assert_eq!(alarm["videoUrl"], "");
        assert!(alarm.get("startTime").is_some());
        assert!(alarm.get("endTime").is_some());
    }
}
