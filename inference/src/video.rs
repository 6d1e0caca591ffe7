//! Frame sources for the playback controller
//!
//! A [`FrameSource`] is a seekable cursor over decoded RGB frames. Video files
//! and cameras go through OpenCV (`opencv` feature); image folders and
//! in-memory frame lists work in every build.

use crate::config::PlaybackConfig;
use crate::error::{DetectionError, Result};
use image::RgbImage;
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Outcome of reading the next frame
#[derive(Debug)]
pub enum FrameRead {
    Frame(RgbImage),
    /// The cursor is past the last frame. Not an error.
    EndOfStream,
}

/// Seekable source of RGB frames
pub trait FrameSource: Send {
    /// Total number of frames, 0 for live sources
    fn frame_count(&self) -> u64;

    /// Frame rate reported by the source; may be 0 or negative for live sources
    fn fps(&self) -> f64;

    /// Move the cursor so the next `read` returns frame `index`
    fn seek(&mut self, index: u64) -> Result<()>;

    /// Decode the frame at the cursor and advance it
    fn read(&mut self) -> Result<FrameRead>;

    /// Human readable description for logs and status
    fn describe(&self) -> String;
}

/// Frames held in memory
pub struct MemorySource {
    frames: Vec<RgbImage>,
    cursor: usize,
    fps: f64,
    fail_at: Option<usize>,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            frames,
            cursor: 0,
            fps,
            fail_at: None,
        }
    }

    /// `count` solid frames whose red channel encodes the frame index (mod 256)
    pub fn numbered(count: usize, width: u32, height: u32, fps: f64) -> Self {
        let frames = (0..count)
            .map(|i| RgbImage::from_pixel(width, height, image::Rgb([(i % 256) as u8, 0, 0])))
            .collect();
        Self::new(frames, fps)
    }

    /// Make the read of frame `index` fail with a decode error
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.cursor = (index as usize).min(self.frames.len());
        Ok(())
    }

    fn read(&mut self) -> Result<FrameRead> {
        if self.fail_at == Some(self.cursor) {
            return Err(DetectionError::source_read(format!(
                "corrupt frame {}",
                self.cursor
            )));
        }
        match self.frames.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                Ok(FrameRead::Frame(frame.clone()))
            }
            None => Ok(FrameRead::EndOfStream),
        }
    }

    fn describe(&self) -> String {
        format!("memory ({} frames)", self.frames.len())
    }
}

/// Still images from a directory, played in file name order
pub struct ImageSequenceSource {
    label: String,
    paths: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl ImageSequenceSource {
    /// Scan `dir` for png/jpg/jpeg/bmp files
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| DetectionError::source_open(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(DetectionError::source_open(format!(
                "{}: no image files found",
                dir.display()
            )));
        }

        info!("Image sequence {}: {} frames", dir.display(), paths.len());
        Ok(Self {
            label: dir.display().to_string(),
            paths,
            cursor: 0,
            fps,
        })
    }

    /// A single still image shown as a one-frame stream
    pub fn single(path: impl AsRef<Path>, fps: f64) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DetectionError::source_open(format!(
                "{}: file not found",
                path.display()
            )));
        }
        Ok(Self {
            label: path.display().to_string(),
            paths: vec![path.to_path_buf()],
            cursor: 0,
            fps,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> u64 {
        self.paths.len() as u64
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        self.cursor = (index as usize).min(self.paths.len());
        Ok(())
    }

    fn read(&mut self) -> Result<FrameRead> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(FrameRead::EndOfStream);
        };
        let frame = image::open(path)
            .map_err(|e| DetectionError::source_read(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        self.cursor += 1;
        Ok(FrameRead::Frame(frame))
    }

    fn describe(&self) -> String {
        format!("images {} ({} frames)", self.label, self.paths.len())
    }
}

/// Where frames come from, as selected by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    Camera(i32),
    ImageDir(PathBuf),
}

impl VideoSource {
    /// Interpret a command-line argument: integers are camera indices,
    /// directories are image sequences, anything else is a file
    pub fn parse(arg: &str) -> Self {
        if let Ok(index) = arg.trim().parse::<i32>() {
            return VideoSource::Camera(index);
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            VideoSource::ImageDir(path)
        } else {
            VideoSource::File(path)
        }
    }

    /// Open the source, failing with `SourceOpen` when it cannot be read
    pub fn open(&self, config: &PlaybackConfig) -> Result<Box<dyn FrameSource>> {
        match self {
            VideoSource::ImageDir(dir) => {
                Ok(Box::new(ImageSequenceSource::open(dir, config.default_fps)?))
            }
            VideoSource::File(path) if is_image_file(path) => {
                Ok(Box::new(ImageSequenceSource::single(path, config.default_fps)?))
            }
            VideoSource::File(path) => open_video_file(path),
            VideoSource::Camera(index) => open_camera(*index),
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::File(path) => write!(f, "file {}", path.display()),
            VideoSource::Camera(index) => write!(f, "camera {}", index),
            VideoSource::ImageDir(path) => write!(f, "images {}", path.display()),
        }
    }
}

#[cfg(feature = "opencv")]
fn open_video_file(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::video_utils::VideoCaptureSource::open_file(path)?))
}

#[cfg(feature = "opencv")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::video_utils::VideoCaptureSource::open_camera(index)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video_file(path: &Path) -> Result<Box<dyn FrameSource>> {
    Err(DetectionError::source_open(format!(
        "{}: video decoding requires the `opencv` feature",
        path.display()
    )))
}

#[cfg(not(feature = "opencv"))]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    Err(DetectionError::source_open(format!(
        "camera {}: capture requires the `opencv` feature",
        index
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_frame(read: FrameRead) -> RgbImage {
        match read {
            FrameRead::Frame(frame) => frame,
            FrameRead::EndOfStream => panic!("unexpected end of stream"),
        }
    }

    #[test]
    fn test_memory_source_read_and_seek() {
        let mut source = MemorySource::numbered(5, 4, 4, 30.0);
        assert_eq!(source.frame_count(), 5);

        assert_eq!(expect_frame(source.read().unwrap()).get_pixel(0, 0)[0], 0);
        source.seek(3).unwrap();
        assert_eq!(expect_frame(source.read().unwrap()).get_pixel(0, 0)[0], 3);
        assert_eq!(expect_frame(source.read().unwrap()).get_pixel(0, 0)[0], 4);
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));

        // Seeking past the end clamps
        source.seek(99).unwrap();
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));
    }

    #[test]
    fn test_memory_source_failure() {
        let mut source = MemorySource::numbered(3, 2, 2, 30.0).failing_at(1);
        assert!(source.read().is_ok());
        assert!(matches!(source.read(), Err(DetectionError::SourceRead(_))));
    }

    #[test]
    fn test_image_sequence_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10), ("c.jpg", 30)] {
            RgbImage::from_pixel(4, 4, image::Rgb([value, value, value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 12.0).unwrap();
        assert_eq!(source.frame_count(), 3);
        assert_eq!(source.fps(), 12.0);

        assert_eq!(expect_frame(source.read().unwrap()).get_pixel(0, 0)[0], 10);
        source.seek(1).unwrap();
        assert_eq!(expect_frame(source.read().unwrap()).get_pixel(0, 0)[0], 20);
        source.seek(3).unwrap();
        assert!(matches!(source.read().unwrap(), FrameRead::EndOfStream));
    }

    #[test]
    fn test_image_sequence_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 25.0),
            Err(DetectionError::SourceOpen(_))
        ));
        assert!(matches!(
            ImageSequenceSource::open("/nonexistent/frames", 25.0),
            Err(DetectionError::SourceOpen(_))
        ));
    }

    #[test]
    fn test_video_source_parse() {
        assert_eq!(VideoSource::parse("0"), VideoSource::Camera(0));
        assert_eq!(
            VideoSource::parse("clip.mp4"),
            VideoSource::File(PathBuf::from("clip.mp4"))
        );

        let dir = tempfile::tempdir().unwrap();
        let arg = dir.path().to_string_lossy().to_string();
        assert_eq!(
            VideoSource::parse(&arg),
            VideoSource::ImageDir(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let source = VideoSource::File(PathBuf::from("/nonexistent/missing.mp4"));
        assert!(matches!(
            source.open(&PlaybackConfig::default()),
            Err(DetectionError::SourceOpen(_))
        ));
    }
}
