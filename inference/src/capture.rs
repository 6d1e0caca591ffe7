//! Snapshot export of raw (unannotated) frames

use crate::config::CaptureConfig;
use crate::error::{DetectionError, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Saves frames as `screenshot_YYYYmmdd_HHMMSS.jpg` in a directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    directory: PathBuf,
}

impl SnapshotWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.directory.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Save a frame stamped with the current local time
    pub fn save(&self, frame: &RgbImage) -> Result<PathBuf> {
        self.save_at(frame, Local::now())
    }

    /// Save a frame stamped with `timestamp`; same-second captures get a `_N` suffix
    pub fn save_at(&self, frame: &RgbImage, timestamp: DateTime<Local>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory)?;

        let stem = timestamp.format("screenshot_%Y%m%d_%H%M%S").to_string();
        let path = self.unused_path(&stem)?;
        save_image(frame, &path)?;
        log::info!("Snapshot saved to {}", path.display());
        Ok(path)
    }

    fn unused_path(&self, stem: &str) -> Result<PathBuf> {
        let first = self.directory.join(format!("{}.jpg", stem));
        if !first.exists() {
            return Ok(first);
        }
        (1..1000)
            .map(|n| self.directory.join(format!("{}_{}.jpg", stem, n)))
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| {
                DetectionError::config(format!(
                    "Too many snapshots named {} in {}",
                    stem,
                    self.directory.display()
                ))
            })
    }
}

/// Write a frame to `path`; the format follows the file extension
pub fn save_image(frame: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    frame.save(path.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_name_and_collision() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("shots"));
        let frame = RgbImage::from_pixel(16, 8, image::Rgb([10, 200, 30]));
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let first = writer.save_at(&frame, timestamp).unwrap();
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "screenshot_20240309_140507.jpg"
        );
        assert!(first.exists());

        let second = writer.save_at(&frame, timestamp).unwrap();
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "screenshot_20240309_140507_1.jpg"
        );

        let loaded = image::open(&first).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (16, 8));
    }

    #[test]
    fn test_save_image_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let frame = RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));

        save_image(&frame, &path).unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgb8(), frame);
    }

    #[test]
    fn test_save_image_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RgbImage::new(2, 2);
        assert!(matches!(
            save_image(&frame, dir.path().join("frame.unknown")),
            Err(DetectionError::Image(_))
        ));
    }
}
