//! Hazard Watch
//!
//! Frame annotation pipeline for multi-hazard video monitoring. A video stream
//! is decoded on a playback thread, and for the operator-selected hazard
//! category (crowd, fire, smoking, vehicle, weapon) each frame is run through
//! that category's detector, annotated with the category's overlay policy and
//! published to a display sink.

pub mod annotation;
pub mod capture;
pub mod config;
pub mod detector_stub;
pub mod detector_trait;
pub mod error;
pub mod frame_pipeline;
pub mod image_utils;
pub mod playback;
pub mod sink;
pub mod types;
pub mod video;

#[cfg(feature = "onnx")]
pub mod detector_yolov8;

#[cfg(feature = "opencv")]
pub mod video_utils;

pub use annotation::{annotate, draw, draw_indicator, plan, OverlayPlan, Thresholds};
pub use capture::SnapshotWriter;
pub use config::HazardConfig;
pub use detector_stub::ScriptedDetector;
pub use detector_trait::{Detector, DetectorRegistry, DetectorType};
pub use error::{DetectionError, Result};
pub use frame_pipeline::{DetectionSession, PipelineCoordinator, PipelineStats};
pub use playback::{format_clock, PlaybackController, PlaybackStatus};
pub use sink::{ChannelSink, FrameSink, LatestFrameSink, PublishedFrame};
pub use types::{BoundingBox, Category, Detection, PlayerState};
pub use video::{FrameRead, FrameSource, ImageSequenceSource, MemorySource, VideoSource};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
