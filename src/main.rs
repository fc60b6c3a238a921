// src/main.rs

mod aggregator;
mod clip;
mod config;
mod notifier;
mod observation_stream;
mod types;
mod vocabulary;

use aggregator::ViolationAggregator;
use anyhow::Result;
use notifier::NotificationClient;
use observation_stream::{find_observation_files, ObservationReader};
use std::path::Path;
use tracing::{debug, error, info, warn};
use types::ViolationEvent;
use vocabulary::ViolationVocabulary;

#[tokio::main]
async fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("ppe_notification={}", config.logging.level))
        .init();

    info!("👷 PPE Smart Notification Starting");
    info!("✓ Configuration loaded");
    info!(
        "Aggregator: window={} frames, prime_at={}, trigger={:.0}% of window, cooldown={:.0}s",
        config.aggregator.frames_threshold,
        config.aggregator.begin_threshold,
        config.aggregator.frames_percent_trig * 100.0,
        config.aggregator.time_betw_trigs
    );

    if config.aggregator.begin_threshold != config.aggregator.frames_threshold as u64 {
        warn!(
            "begin_threshold ({}) differs from frames_threshold ({}); the window will \
             hold {} frame(s) once evaluation begins",
            config.aggregator.begin_threshold,
            config.aggregator.frames_threshold,
            config.aggregator.begin_threshold
        );
    }

    let notifier = if config.notification.enabled {
        match NotificationClient::new(config.notification.clone(), config.clip.clone()) {
            Ok(client) => {
                info!("📡 Alert endpoint: {}", config.notification.endpoint_url);
                Some(client)
            }
            Err(e) => {
                warn!(
                    "⚠️  Notification client failed to build: {}. Continuing without alerts.",
                    e
                );
                None
            }
        }
    } else {
        info!("⚪ Notification dispatch disabled in config");
        None
    };

    let observation_files = find_observation_files(&config.stream.input_dir)?;
    if observation_files.is_empty() {
        error!("No observation files found in {}", config.stream.input_dir);
        return Ok(());
    }

    let mut aggregator = ViolationAggregator::new(
        config.aggregator.clone(),
        ViolationVocabulary::default(),
    );

    for (idx, path) in observation_files.iter().enumerate() {
        info!(
            "Processing stream {}/{}: {}",
            idx + 1,
            observation_files.len(),
            path.display()
        );

        match process_stream(path, &mut aggregator, notifier.as_ref(), &config).await {
            Ok(stats) => {
                info!("✓ Stream processed");
                info!("  Frames observed: {}", stats.frames_observed);
                info!("  🚨 Violations fired: {}", stats.violations_fired);
                info!("  📨 Alerts sent: {}", stats.alerts_sent);
                if stats.alert_failures > 0 {
                    warn!("  ⚠️  Alert failures: {}", stats.alert_failures);
                }
            }
            Err(e) => {
                error!("Failed to process stream: {:#}", e);
            }
        }

        // Each file is its own observation stream.
        aggregator.reset();
    }

    Ok(())
}

#[derive(Debug, Default)]
struct StreamStats {
    frames_observed: u64,
    violations_fired: usize,
    alerts_sent: usize,
    alert_failures: usize,
}

async fn process_stream(
    path: &Path,
    aggregator: &mut ViolationAggregator,
    notifier: Option<&NotificationClient>,
    config: &types::Config,
) -> Result<StreamStats> {
    let mut reader = ObservationReader::open(path)?;
    let mut stats = StreamStats::default();

    std::fs::create_dir_all(&config.stream.output_dir)?;
    let stream_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stream");
    let jsonl_path = Path::new(&config.stream.output_dir)
        .join(format!("{}_violations.jsonl", stream_name));
    let mut results_file = std::fs::File::create(&jsonl_path)?;
    info!("💾 Violations will be written to: {}", jsonl_path.display());

    while let Some(obs) = reader.next_observation()? {
        if obs.pipeline_end {
            info!(
                "⏹  Pipeline end after frame {} — resetting aggregator",
                aggregator.frame_count()
            );
            aggregator.reset();
            continue;
        }

        stats.frames_observed += 1;
        let events = aggregator.observe(obs.ids, obs.labels);

        for event in events {
            warn!(
                "🚨 VIOLATION: track #{} '{}' (type {}) at frame {}",
                event.track_id,
                event.label,
                event.violation_id,
                aggregator.frame_count()
            );
            save_violation_event(&event, &mut results_file)?;
            stats.violations_fired += 1;

            if let Some(client) = notifier {
                match client.notify(event.violation_id).await {
                    Ok(()) => stats.alerts_sent += 1,
                    Err(e) => {
                        warn!("Failed to deliver alert: {:#}", e);
                        stats.alert_failures += 1;
                    }
                }
            }
        }

        if stats.frames_observed % 500 == 0 {
            debug!(
                "Progress: {} frames | primed: {} | violations: {}",
                stats.frames_observed,
                aggregator.is_primed(),
                stats.violations_fired
            );
        }
    }

    Ok(stats)
}

fn save_violation_event(event: &ViolationEvent, file: &mut std::fs::File) -> Result<()> {
    use std::io::Write;
    let json_line = serde_json::to_string(event)?;
    writeln!(file, "{}", json_line)?;
    file.flush()?;
    Ok(())
}
