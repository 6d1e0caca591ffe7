//! Display boundary: where finished frames are published
//!
//! The pipeline never blocks on a slow consumer. [`LatestFrameSink`] keeps
//! only the newest frame; [`ChannelSink`] queues a few and drops the rest.

use crate::types::Category;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use image::RgbImage;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One frame ready for display
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    /// Source frame index
    pub index: u64,
    pub image: Arc<RgbImage>,
    /// Category selected when the frame was processed
    pub category: Option<Category>,
    /// Boxes drawn on the frame
    pub detection_count: usize,
    /// True when detection overlays were rendered
    pub annotated: bool,
}

/// Receives finished frames from the decode loop thread
pub trait FrameSink: Send + Sync {
    fn publish(&self, frame: PublishedFrame);
}

/// Keeps the most recent frame for polling front ends
#[derive(Default)]
pub struct LatestFrameSink {
    slot: Mutex<Option<PublishedFrame>>,
    published: AtomicU64,
    signal: Condvar,
}

impl LatestFrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<PublishedFrame> {
        self.slot.lock().clone()
    }

    /// Total frames published so far
    pub fn count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Block until at least `count` frames were published or the timeout expires
    pub fn wait_for(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while self.count() < count {
            if self.signal.wait_until(&mut slot, deadline).timed_out() {
                return self.count() >= count;
            }
        }
        true
    }
}

impl FrameSink for LatestFrameSink {
    fn publish(&self, frame: PublishedFrame) {
        let mut slot = self.slot.lock();
        *slot = Some(frame);
        self.published.fetch_add(1, Ordering::AcqRel);
        self.signal.notify_all();
    }
}

/// Bounded channel sink; frames are dropped when the consumer lags
pub struct ChannelSink {
    tx: Sender<PublishedFrame>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<PublishedFrame>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSink for ChannelSink {
    fn publish(&self, frame: PublishedFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 100 == 1 {
                    log::debug!(
                        "Display lagging, dropped frame {} ({} total)",
                        frame.index,
                        dropped
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
