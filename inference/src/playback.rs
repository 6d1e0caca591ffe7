//! Playback controller: owns the frame source and drives the decode loop
//!
//! Commands (`open`, `play`, `pause`, `seek`, `restart`) are serialized by the
//! worker-slot mutex that owns the loop's `JoinHandle`, so at most one loop
//! ever reads the source. The loop itself only observes atomic flags:
//! `playing` ends it cooperatively, `seeking` makes it yield until the cursor
//! has been repositioned.

use crate::config::PlaybackConfig;
use crate::error::{DetectionError, Result};
use crate::frame_pipeline::PipelineCoordinator;
use crate::types::PlayerState;
use crate::video::{FrameRead, FrameSource, VideoSource};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Frame rate used when neither the source nor the configuration has a usable one
pub const FALLBACK_FPS: f64 = 25.0;

/// Snapshot of the controller, readable from any thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    pub position: u64,
    pub duration_frames: u64,
    pub fps: f64,
    /// Playback position in seconds at the source frame rate
    pub position_secs: f64,
    pub duration_secs: f64,
    pub seeking: bool,
    pub source: Option<String>,
}

impl PlaybackStatus {
    /// Elapsed and total time as `HH:MM:SS / HH:MM:SS`
    pub fn clock(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.position_secs),
            format_clock(self.duration_secs)
        )
    }
}

/// Whole seconds as `HH:MM:SS`; hours are not wrapped at 24
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

fn usable_fps(fps: f64) -> bool {
    fps.is_finite() && fps > 0.0
}

fn frames_to_secs(frames: u64, fps: f64) -> f64 {
    if usable_fps(fps) {
        frames as f64 / fps
    } else {
        0.0
    }
}

/// State shared with the decode loop thread
struct Shared {
    source: Mutex<Option<Box<dyn FrameSource>>>,
    description: Mutex<Option<String>>,
    playing: AtomicBool,
    seeking: AtomicBool,
    position: AtomicU64,
    duration: AtomicU64,
    fps_bits: AtomicU64,
    state: AtomicU8,
}

impl Shared {
    fn new() -> Self {
        Self {
            source: Mutex::new(None),
            description: Mutex::new(None),
            playing: AtomicBool::new(false),
            seeking: AtomicBool::new(false),
            position: AtomicU64::new(0),
            duration: AtomicU64::new(0),
            fps_bits: AtomicU64::new(0),
            state: AtomicU8::new(PlayerState::Stopped.code()),
        }
    }

    fn state(&self) -> PlayerState {
        PlayerState::from_code(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlayerState) {
        self.state.store(state.code(), Ordering::Release);
    }

    fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Acquire))
    }
}

enum Step {
    Frame(u64, image::RgbImage),
    Finished,
    Yield,
}

/// Owns the frame source, its cursor and the decode loop thread
pub struct PlaybackController {
    shared: Arc<Shared>,
    coordinator: Arc<PipelineCoordinator>,
    config: PlaybackConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackController {
    pub fn new(coordinator: Arc<PipelineCoordinator>, mut config: PlaybackConfig) -> Self {
        if !usable_fps(config.default_fps) {
            warn!(
                "Invalid default FPS ({}) in playback config, using {}",
                config.default_fps, FALLBACK_FPS
            );
            config.default_fps = FALLBACK_FPS;
        }
        Self {
            shared: Arc::new(Shared::new()),
            coordinator,
            config,
            worker: Mutex::new(None),
        }
    }

    pub fn coordinator(&self) -> &Arc<PipelineCoordinator> {
        &self.coordinator
    }

    /// Open a source described by the operator
    ///
    /// Any running loop is stopped and the previous source released first.
    /// On failure the controller is left Stopped with no source.
    pub fn open(&self, source: &VideoSource) -> Result<()> {
        let mut worker = self.worker.lock();
        self.stop_loop(&mut worker);
        self.release_source();

        let opened = source.open(&self.config).inspect_err(|e| {
            error!("Failed to open {}: {}", source, e);
        })?;
        self.install(opened);
        Ok(())
    }

    /// Load an already opened source
    pub fn load(&self, source: Box<dyn FrameSource>) {
        let mut worker = self.worker.lock();
        self.stop_loop(&mut worker);
        self.release_source();
        self.install(source);
    }

    fn release_source(&self) {
        if self.shared.source.lock().take().is_some() {
            debug!("Released previous source");
        }
        *self.shared.description.lock() = None;
        self.shared.position.store(0, Ordering::Release);
        self.shared.duration.store(0, Ordering::Release);
        self.shared.fps_bits.store(0, Ordering::Release);
        self.shared.set_state(PlayerState::Stopped);
    }

    fn install(&self, source: Box<dyn FrameSource>) {
        let mut fps = source.fps();
        if !usable_fps(fps) {
            warn!(
                "Video source returned invalid FPS ({}), defaulting to {}",
                fps, self.config.default_fps
            );
            fps = self.config.default_fps;
        }
        let description = source.describe();
        let duration = source.frame_count();
        info!(
            "Opened {}: {} frames @ {:.2} FPS",
            description, duration, fps
        );

        self.shared.duration.store(duration, Ordering::Release);
        self.shared.fps_bits.store(fps.to_bits(), Ordering::Release);
        self.shared.position.store(0, Ordering::Release);
        *self.shared.description.lock() = Some(description);
        *self.shared.source.lock() = Some(source);
        self.shared.set_state(PlayerState::Stopped);
    }

    fn has_source(&self) -> bool {
        self.shared.source.lock().is_some()
    }

    /// Start the decode loop; a no-op while a loop is already running
    pub fn play(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        self.play_locked(&mut worker)
    }

    fn play_locked(&self, worker: &mut Option<JoinHandle<()>>) -> Result<()> {
        if !self.has_source() {
            return Err(DetectionError::NoSource);
        }

        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() && self.shared.playing.load(Ordering::Acquire) {
                debug!("play: loop already running");
                return Ok(());
            }
        }
        // A finished loop (end of stream) is reaped before spawning the next
        self.join_worker(worker);

        self.shared.playing.store(true, Ordering::Release);
        self.shared.set_state(PlayerState::Playing);

        let shared = Arc::clone(&self.shared);
        let coordinator = Arc::clone(&self.coordinator);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name("hazard-playback".to_string())
            .spawn(move || run_loop(shared, coordinator, config));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.playing.store(false, Ordering::Release);
                self.shared.set_state(PlayerState::Stopped);
                Err(e.into())
            }
        }
    }

    /// Stop the loop after its in-flight frame, keeping the position
    pub fn pause(&self) {
        let mut worker = self.worker.lock();
        self.pause_locked(&mut worker);
    }

    fn pause_locked(&self, worker: &mut Option<JoinHandle<()>>) {
        self.stop_loop(worker);
        // The loop may have reached the end of stream meanwhile and gone Stopped
        let _ = self.shared.state.compare_exchange(
            PlayerState::Playing.code(),
            PlayerState::Paused.code(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Play when paused or stopped, pause when playing
    pub fn toggle(&self) -> Result<PlayerState> {
        let mut worker = self.worker.lock();
        if self.shared.playing.load(Ordering::Acquire) {
            self.pause_locked(&mut worker);
        } else {
            self.play_locked(&mut worker)?;
        }
        Ok(self.shared.state())
    }

    /// Jump to `fraction` of the stream (0.0 = start, 1.0 = end)
    pub fn seek(&self, fraction: f64) -> Result<()> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(DetectionError::InvalidSeek(fraction));
        }
        let _worker = self.worker.lock();
        let duration = self.shared.duration.load(Ordering::Acquire);
        let target = ((fraction * duration as f64).round() as u64).min(duration);
        self.seek_to(target)
    }

    fn seek_to(&self, target: u64) -> Result<()> {
        self.shared.seeking.store(true, Ordering::Release);
        let result = {
            let mut source = self.shared.source.lock();
            match source.as_mut() {
                Some(source) => source.seek(target).map(|()| {
                    self.shared.position.store(target, Ordering::Release);
                }),
                None => Err(DetectionError::NoSource),
            }
        };
        self.shared.seeking.store(false, Ordering::Release);

        if result.is_ok() {
            debug!("Seeked to frame {}", target);
        }
        result
    }

    /// Rewind to the first frame, resuming playback if it was playing
    pub fn restart(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if !self.has_source() {
            return Err(DetectionError::NoSource);
        }

        let was_playing = self.shared.playing.load(Ordering::Acquire);
        self.pause_locked(&mut worker);
        self.seek_to(0)?;
        info!("Restarted playback (resume: {})", was_playing);

        if was_playing {
            self.play_locked(&mut worker)?;
        }
        Ok(())
    }

    pub fn state(&self) -> PlayerState {
        self.shared.state()
    }

    pub fn position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PlaybackStatus {
        let position = self.shared.position.load(Ordering::Acquire);
        let duration = self.shared.duration.load(Ordering::Acquire);
        let fps = self.shared.fps();
        PlaybackStatus {
            state: self.shared.state(),
            position,
            duration_frames: duration,
            fps,
            position_secs: frames_to_secs(position, fps),
            duration_secs: frames_to_secs(duration, fps),
            seeking: self.shared.seeking.load(Ordering::Acquire),
            source: self.shared.description.lock().clone(),
        }
    }

    fn stop_loop(&self, worker: &mut Option<JoinHandle<()>>) {
        self.shared.playing.store(false, Ordering::Release);
        self.join_worker(worker);
    }

    fn join_worker(&self, worker: &mut Option<JoinHandle<()>>) {
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("Playback loop panicked");
                self.shared.set_state(PlayerState::Stopped);
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let mut worker = self.worker.lock();
        self.stop_loop(&mut worker);
    }
}

/// Rewind after the last frame or a decode failure
fn finish_stream(shared: &Shared, source: &mut dyn FrameSource) {
    if let Err(e) = source.seek(0) {
        warn!("Failed to rewind source: {}", e);
    }
    shared.position.store(0, Ordering::Release);
    shared.set_state(PlayerState::Stopped);
    shared.playing.store(false, Ordering::Release);
}

fn run_loop(shared: Arc<Shared>, coordinator: Arc<PipelineCoordinator>, config: PlaybackConfig) {
    let fps = shared.fps();
    let frame_period = if config.realtime {
        let period = Duration::try_from_secs_f64(1.0 / fps).ok();
        if period.is_none() {
            warn!("Cannot pace playback at {} FPS, decoding unpaced", fps);
        }
        period
    } else {
        None
    };
    let seek_poll = Duration::from_millis(config.seek_poll_ms.max(1));
    let mut frames = 0u64;

    info!(
        "Playback loop started at frame {} ({:.2} FPS, realtime: {})",
        shared.position.load(Ordering::Acquire),
        fps,
        config.realtime
    );

    while shared.playing.load(Ordering::Acquire) {
        if shared.seeking.load(Ordering::Acquire) {
            thread::sleep(seek_poll);
            continue;
        }

        let frame_start = Instant::now();
        let step = {
            let mut guard = shared.source.lock();
            match guard.as_mut() {
                _ if shared.seeking.load(Ordering::Acquire) => Step::Yield,
                None => {
                    shared.playing.store(false, Ordering::Release);
                    shared.set_state(PlayerState::Stopped);
                    Step::Finished
                }
                Some(source) => match source.read() {
                    Ok(FrameRead::Frame(frame)) => {
                        let index = shared.position.fetch_add(1, Ordering::AcqRel);
                        Step::Frame(index, frame)
                    }
                    Ok(FrameRead::EndOfStream) => {
                        info!("End of stream after {} frames", frames);
                        finish_stream(&shared, &mut **source);
                        Step::Finished
                    }
                    Err(e) => {
                        error!("Decode failed, stopping playback: {}", e);
                        finish_stream(&shared, &mut **source);
                        Step::Finished
                    }
                },
            }
        };

        match step {
            Step::Yield => continue,
            Step::Finished => break,
            Step::Frame(index, frame) => {
                coordinator.process_frame(index, frame);
                frames += 1;
            }
        }

        if let Some(frame_period) = frame_period {
            let elapsed = frame_start.elapsed();
            if elapsed < frame_period {
                thread::sleep(frame_period - elapsed);
            }
        }
    }

    info!(
        "Playback loop stopped after {} frames at position {}",
        frames,
        shared.position.load(Ordering::Acquire)
    );
}
