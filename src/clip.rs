// src/clip.rs
//
// Best-effort evidence clip assembly. The capture stage drops frame images
// into a directory; when a violation fires we stitch every Nth image into a
// short low-fps mp4 that accompanies the alert.

use anyhow::{Context, Result};
use opencv::{
    imgcodecs,
    prelude::*,
    videoio::{VideoWriter, VideoWriterTrait},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Build a clip from the frame images in `img_dir`, writing it to `vid_dir`.
/// Returns the clip file name and full path.
pub fn build_clip(
    img_dir: &Path,
    vid_dir: &Path,
    sample_stride: usize,
    fps: f64,
) -> Result<(String, PathBuf)> {
    let images = collect_frame_images(img_dir)?;
    let sampled = select_clip_frames(images, sample_stride);
    if sampled.is_empty() {
        anyhow::bail!("no frame images in {}", img_dir.display());
    }

    let first = imgcodecs::imread(
        sampled[0].to_str().unwrap_or_default(),
        imgcodecs::IMREAD_COLOR,
    )?;
    if first.empty() {
        anyhow::bail!("failed to decode first frame image {}", sampled[0].display());
    }
    let frame_size = first.size()?;

    let stem = sampled[0]
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("clip");
    let vid_name = format!("{}.mp4", stem);

    fs::create_dir_all(vid_dir)?;
    let vid_path = vid_dir.join(&vid_name);

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let mut writer = VideoWriter::new(
        vid_path.to_str().unwrap_or_default(),
        fourcc,
        fps,
        frame_size,
        true,
    )
    .context("failed to create clip writer")?;

    let mut written = 0usize;
    for image_path in &sampled {
        let frame = imgcodecs::imread(
            image_path.to_str().unwrap_or_default(),
            imgcodecs::IMREAD_COLOR,
        )?;
        if frame.empty() {
            warn!("Skipping unreadable frame image {}", image_path.display());
            continue;
        }
        writer.write(&frame)?;
        written += 1;
    }
    writer.release()?;

    debug!(
        "Clip {} assembled from {} of {} sampled frame(s)",
        vid_name,
        written,
        sampled.len()
    );

    Ok((vid_name, vid_path))
}

fn collect_frame_images(img_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(img_dir)
        .with_context(|| format!("failed to read frame image dir {}", img_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
            images.push(path);
        }
    }
    Ok(images)
}

/// Sort by filename and keep every `stride`th image. A 200-frame capture at
/// stride 4 becomes a 50-frame clip, ten seconds at 5 fps.
fn select_clip_frames(mut images: Vec<PathBuf>, stride: usize) -> Vec<PathBuf> {
    images.sort();
    images.into_iter().step_by(stride.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_select_every_fourth_frame_in_order() {
        let images = paths(&[
            "frames/003.jpg",
            "frames/001.jpg",
            "frames/007.jpg",
            "frames/000.jpg",
            "frames/005.jpg",
            "frames/002.jpg",
            "frames/006.jpg",
            "frames/004.jpg",
        ]);

        let selected = select_clip_frames(images, 4);
        assert_eq!(selected, paths(&["frames/000.jpg", "frames/004.jpg"]));
    }

    #[test]
    fn test_zero_stride_falls_back_to_every_frame() {
        let images = paths(&["a.jpg", "b.jpg"]);
        let selected = select_clip_frames(images, 0);
        assert_eq!(selected.len(), 2);
    }
}
