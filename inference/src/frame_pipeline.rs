//! Per-frame coordination between playback, detection and display
//!
//! The playback loop hands every decoded frame to
//! [`PipelineCoordinator::process_frame`]. The coordinator keeps the raw frame
//! for capture, runs the selected category's detector when detection is
//! active, renders the overlay and the category indicator, and publishes the
//! result to the [`FrameSink`].

use crate::annotation::{annotate, draw_indicator, Thresholds};
use crate::detector_trait::{Detector, DetectorRegistry};
use crate::sink::{FrameSink, PublishedFrame};
use crate::types::Category;
use image::RgbImage;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Operator-controlled detection switches, independent of playback state
#[derive(Debug, Default)]
pub struct DetectionSession {
    active: AtomicBool,
    // Category::code(), 0 = none selected
    category: AtomicU8,
}

impl DetectionSession {
    pub fn new(active: bool, category: Option<Category>) -> Self {
        let session = Self::default();
        session.set_active(active);
        session.set_category(category);
        session
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// Flip detection on/off, returning the new value
    pub fn toggle(&self) -> bool {
        !self.active.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_code(self.category.load(Ordering::Acquire))
    }

    pub fn set_category(&self, category: Option<Category>) {
        let code = category.map(|c| c.code()).unwrap_or(0);
        self.category.store(code, Ordering::Release);
    }

    /// Consistent view for one frame
    pub fn snapshot(&self) -> (bool, Option<Category>) {
        (self.is_active(), self.category())
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub frames_published: u64,
    pub frames_annotated: u64,
    pub inference_failures: u64,
    pub last_inference_ms: f64,
}

#[derive(Default)]
struct StatsCounters {
    published: AtomicU64,
    annotated: AtomicU64,
    failures: AtomicU64,
    last_inference_us: AtomicU64,
}

pub struct PipelineCoordinator {
    session: DetectionSession,
    // One inference in flight at a time
    detectors: Mutex<DetectorRegistry>,
    thresholds: Thresholds,
    sink: Arc<dyn FrameSink>,
    last_raw: Mutex<Option<Arc<RgbImage>>>,
    stats: StatsCounters,
    started: Mutex<Option<Instant>>,
}

impl PipelineCoordinator {
    pub fn new(
        detectors: DetectorRegistry,
        thresholds: Thresholds,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            session: DetectionSession::default(),
            detectors: Mutex::new(detectors),
            thresholds,
            sink,
            last_raw: Mutex::new(None),
            stats: StatsCounters::default(),
            started: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Replace the detector for one category
    pub fn set_detector(&self, category: Category, detector: Box<dyn Detector>) {
        self.detectors.lock().insert(category, detector);
    }

    /// Latest decoded frame without any overlay
    pub fn current_raw_frame(&self) -> Option<Arc<RgbImage>> {
        self.last_raw.lock().clone()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_published: self.stats.published.load(Ordering::Relaxed),
            frames_annotated: self.stats.annotated.load(Ordering::Relaxed),
            inference_failures: self.stats.failures.load(Ordering::Relaxed),
            last_inference_ms: self.stats.last_inference_us.load(Ordering::Relaxed) as f64
                / 1000.0,
        }
    }

    /// Process frame `index` and publish the result
    ///
    /// Inference failures are logged and counted; the frame is still published
    /// without detection overlays.
    pub fn process_frame(&self, index: u64, frame: RgbImage) {
        let raw = Arc::new(frame);
        *self.last_raw.lock() = Some(Arc::clone(&raw));

        let (active, category) = self.session.snapshot();
        let mut detection_count = 0;
        let mut annotated = false;

        let image = match category {
            None => raw,
            Some(category) => {
                let mut output = (*raw).clone();

                if active {
                    let start = Instant::now();
                    let result = self.detectors.lock().detect(category, &raw);
                    self.stats
                        .last_inference_us
                        .store(start.elapsed().as_micros() as u64, Ordering::Relaxed);

                    match result {
                        Ok(detections) => {
                            let plan =
                                annotate(category, &mut output, &detections, &self.thresholds);
                            detection_count = plan.detection_count();
                            annotated = true;
                            self.stats.annotated.fetch_add(1, Ordering::Relaxed);
                            debug!(
                                "Frame {}: {} raw detections, {} drawn",
                                index,
                                detections.len(),
                                detection_count
                            );
                        }
                        Err(e) => {
                            self.stats.failures.fetch_add(1, Ordering::Relaxed);
                            warn!("Frame {}: {} detection failed: {}", index, category, e);
                        }
                    }
                }

                draw_indicator(&mut output, category);
                Arc::new(output)
            }
        };

        self.sink.publish(PublishedFrame {
            index,
            image,
            category,
            detection_count,
            annotated,
        });

        let published = self.stats.published.fetch_add(1, Ordering::Relaxed) + 1;
        self.log_progress(published);
    }

    fn log_progress(&self, published: u64) {
        let mut started = self.started.lock();
        let start = *started.get_or_insert_with(Instant::now);
        if published % 100 == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            let fps = if elapsed > 0.0 {
                published as f64 / elapsed
            } else {
                0.0
            };
            info!(
                "Published {} frames ({} annotated, {} inference failures, {:.1} FPS)",
                published,
                self.stats.annotated.load(Ordering::Relaxed),
                self.stats.failures.load(Ordering::Relaxed),
                fps
            );
        }
    }
}
