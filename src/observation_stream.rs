// src/observation_stream.rs
//
// Per-frame observations arrive as JSONL exported by the upstream
// detection/tracking pipeline: one object per line with the tracked ids,
// their class labels, and a pipeline_end flag on the final line.

use crate::types::TrackId;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameObservation {
    #[serde(default)]
    pub ids: Vec<TrackId>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub pipeline_end: bool,
}

impl FrameObservation {
    pub fn from_json_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("invalid frame observation")
    }
}

/// Find all .jsonl observation files under the input directory.
pub fn find_observation_files(input_dir: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    info!("Found {} observation file(s)", files.len());
    Ok(files)
}

pub struct ObservationReader {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl ObservationReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open observation file {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Next observation, skipping blank lines. Returns None at end of file.
    pub fn next_observation(&mut self) -> Result<Option<FrameObservation>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let obs = FrameObservation::from_json_line(&line)
                .with_context(|| format!("line {}", self.line_no))?;
            return Ok(Some(obs));
        }
    }
}
