//! Thumbnail grid generation, per spec.md §4.6 step 3: extract up to 10
//! still frames via `ffmpeg`, scale each to width 160, compose into a
//! 2x5 grid with the `image` crate.

use std::path::{Path, PathBuf};

use image::{GenericImage, ImageBuffer, Rgb, RgbImage, imageops};
use rand::Rng;
use tokio::process::Command;

use super::error::UploadError;

const FRAME_COUNT: u32 = 10;
const FRAME_WIDTH: u32 = 160;
const GRID_COLS: u32 = 2;
const GRID_ROWS: u32 = 5;
const EDGE_MARGIN_SECONDS: u32 = 5;

/// Extracts `FRAME_COUNT` frames at random timestamps bounded away from
/// the first/last `EDGE_MARGIN_SECONDS`, scales each to `FRAME_WIDTH`,
/// and composes them into a `GRID_COLS` x `GRID_ROWS` grid image written
/// to `output_path`. The frame temp directory is always removed before
/// returning.
pub async fn generate_thumbnail_grid(
    source_path: &Path,
    duration_seconds: u32,
    output_path: &Path,
) -> Result<(), UploadError> {
    let frame_dir = std::env::temp_dir().join("scraper-thumbs").join(format!("frames-{}", std::process::id()));
    tokio::fs::create_dir_all(&frame_dir)
        .await
        .map_err(|e| UploadError::ThumbnailFailed(format!("failed to create frame dir: {e}")))?;

    let result = extract_and_compose(source_path, duration_seconds, &frame_dir, output_path).await;

    let _ = tokio::fs::remove_dir_all(&frame_dir).await;
    result
}

async fn extract_and_compose(
    source_path: &Path,
    duration_seconds: u32,
    frame_dir: &Path,
    output_path: &Path,
) -> Result<(), UploadError> {
    if duration_seconds <= EDGE_MARGIN_SECONDS * 2 {
        return Err(UploadError::ThumbnailFailed("video too short to sample away from edges".to_string()));
    }

    let usable_range = duration_seconds - EDGE_MARGIN_SECONDS * 2;
    let mut timestamps: Vec<u32> = Vec::with_capacity(FRAME_COUNT as usize);
    {
        let mut rng = rand::thread_rng();
        for _ in 0..FRAME_COUNT {
            timestamps.push(EDGE_MARGIN_SECONDS + rng.gen_range(0..usable_range));
        }
    }
    timestamps.sort_unstable();

    let mut frame_paths = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let frame_path = frame_dir.join(format!("frame-{i:02}.jpg"));
        extract_frame(source_path, *ts, &frame_path).await?;
        frame_paths.push(frame_path);
    }

    compose_grid(&frame_paths, output_path)
}

async fn extract_frame(source_path: &Path, timestamp_seconds: u32, output_path: &Path) -> Result<(), UploadError> {
    let status = Command::new("ffmpeg")
        .args(["-y", "-ss"])
        .arg(timestamp_seconds.to_string())
        .arg("-i")
        .arg(source_path)
        .args(["-vframes", "1", "-q:v", "4"])
        .arg(output_path)
        .status()
        .await
        .map_err(|e| UploadError::ThumbnailFailed(format!("failed to launch ffmpeg: {e}")))?;

    if !status.success() {
        return Err(UploadError::ThumbnailFailed(format!("ffmpeg exited with {status} extracting frame at {timestamp_seconds}s")));
    }
    Ok(())
}

fn compose_grid(frame_paths: &[PathBuf], output_path: &Path) -> Result<(), UploadError> {
    let scaled: Vec<RgbImage> = frame_paths
        .iter()
        .map(|p| {
            let img = image::open(p).map_err(|e| UploadError::ThumbnailFailed(format!("failed to open frame {}: {e}", p.display())))?;
            let scaled_height = (img.height() as f64 * FRAME_WIDTH as f64 / img.width() as f64).round() as u32;
            Ok(imageops::resize(&img.to_rgb8(), FRAME_WIDTH, scaled_height.max(1), imageops::FilterType::Triangle))
        })
        .collect::<Result<Vec<_>, UploadError>>()?;

    let cell_height = scaled.iter().map(|img| img.height()).max().unwrap_or(90);
    let grid_width = FRAME_WIDTH * GRID_COLS;
    let grid_height = cell_height * GRID_ROWS;
    let mut canvas: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(grid_width, grid_height, Rgb([0, 0, 0]));

    for (i, frame) in scaled.iter().enumerate() {
        let col = (i as u32) % GRID_COLS;
        let row = (i as u32) / GRID_COLS;
        let x = col * FRAME_WIDTH;
        let y = row * cell_height;
        canvas
            .copy_from(frame, x, y)
            .map_err(|e| UploadError::ThumbnailFailed(format!("failed to composite frame {i}: {e}")))?;
    }

    canvas.save(output_path).map_err(|e| UploadError::ThumbnailFailed(format!("failed to write thumbnail: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_videos_too_short_to_sample() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("src.mp4");
        let output = dir.path().join("out.jpg");
        let err = extract_and_compose(&source, 8, dir.path(), &output).await.unwrap_err();
        assert!(matches!(err, UploadError::ThumbnailFailed(_)));
    }
}
