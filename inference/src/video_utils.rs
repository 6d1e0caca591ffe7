//! OpenCV-backed frame source for video files and cameras

use crate::error::{DetectionError, Result};
use crate::video::{FrameRead, FrameSource};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_ANY},
};
use std::path::Path;

/// Video file or camera opened through `VideoCapture`
pub struct VideoCaptureSource {
    capture: VideoCapture,
    description: String,
    frame_count: u64,
    fps: f64,
    live: bool,
    // Reused decode buffer
    frame: Mat,
}

impl VideoCaptureSource {
    /// Open a video file
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| DetectionError::source_open(format!("Invalid path: {}", path.display())))?;

        log::info!("Opening video source: {}", path_str);
        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| DetectionError::source_open(format!("{}: {}", path_str, e)))?;

        Self::from_capture(capture, format!("file {}", path_str), false)
    }

    /// Open a camera by index (0 for the default camera)
    pub fn open_camera(index: i32) -> Result<Self> {
        log::info!("Opening camera device: {}", index);
        let capture = VideoCapture::new(index, CAP_ANY)
            .map_err(|e| DetectionError::source_open(format!("camera {}: {}", index, e)))?;

        Self::from_capture(capture, format!("camera {}", index), true)
    }

    fn from_capture(capture: VideoCapture, description: String, live: bool) -> Result<Self> {
        if !capture.is_opened().unwrap_or(false) {
            return Err(DetectionError::source_open(format!(
                "{}: cannot be opened",
                description
            )));
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32;
        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let frame_count = if live {
            0
        } else {
            capture
                .get(videoio::CAP_PROP_FRAME_COUNT)
                .unwrap_or(0.0)
                .max(0.0) as u64
        };

        log::info!(
            "Video properties: {}x{} @ {:.2} FPS, {} frames",
            width,
            height,
            fps,
            frame_count
        );

        Ok(Self {
            capture,
            description,
            frame_count,
            fps,
            live,
            frame: Mat::default(),
        })
    }

    /// Convert the decode buffer (BGR) to an RgbImage
    fn frame_to_rgb(&self) -> Result<RgbImage> {
        let width = self.frame.cols() as u32;
        let height = self.frame.rows() as u32;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&self.frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let data = rgb.data_bytes()?.to_vec();
        RgbImage::from_vec(width, height, data).ok_or_else(|| {
            DetectionError::source_read(format!("Frame buffer size mismatch for {}x{}", width, height))
        })
    }
}

impl FrameSource for VideoCaptureSource {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: u64) -> Result<()> {
        if self.live {
            log::debug!("Ignoring seek on live source {}", self.description);
            return Ok(());
        }
        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
        Ok(())
    }

    fn read(&mut self) -> Result<FrameRead> {
        let ok = self.capture.read(&mut self.frame)?;
        if !ok || self.frame.empty() {
            return Ok(FrameRead::EndOfStream);
        }
        Ok(FrameRead::Frame(self.frame_to_rgb()?))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
