// Scripted detector for running the pipeline without model files.
// Used by tests, benches and the CLI's --dry-run mode.

use crate::detector_trait::Detector;
use crate::error::{DetectionError, Result};
use crate::types::Detection;
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type DetectFn = Box<dyn FnMut(&RgbImage) -> Result<Vec<Detection>> + Send>;

enum Script {
    /// Same result on every call
    Fixed(Vec<Detection>),
    /// One step per call, the last step repeats once the queue drains
    Sequence(VecDeque<Option<Vec<Detection>>>),
    /// Always fail with this message
    Failing(String),
    /// Derive detections from the frame itself
    Function(DetectFn),
}

/// Detector that replays a scripted result instead of running a model
pub struct ScriptedDetector {
    name: String,
    input_size: (u32, u32),
    script: Script,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    fn with_script(script: Script) -> Self {
        Self {
            name: "scripted".to_string(),
            input_size: (640, 640),
            script,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never detects anything
    pub fn empty() -> Self {
        Self::with_script(Script::Fixed(Vec::new()))
    }

    /// Returns the same detections for every frame
    pub fn fixed(detections: Vec<Detection>) -> Self {
        Self::with_script(Script::Fixed(detections))
    }

    /// Returns one entry per call; `None` makes that call fail
    pub fn sequence(steps: Vec<Option<Vec<Detection>>>) -> Self {
        Self::with_script(Script::Sequence(steps.into()))
    }

    /// Fails every call with `ModelInference`
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Failing(message.into()))
    }

    /// Computes detections from the frame content
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut(&RgbImage) -> Result<Vec<Detection>> + Send + 'static,
    {
        Self::with_script(Script::Function(Box::new(f)))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_input_size(mut self, size: (u32, u32)) -> Self {
        self.input_size = size;
        self
    }

    /// Sleep this long in every call to simulate model latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter, still readable after the detector is moved into a registry
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match &mut self.script {
            Script::Fixed(detections) => Ok(detections.clone()),
            Script::Failing(message) => Err(DetectionError::inference(message.clone())),
            Script::Function(f) => f(image),
            Script::Sequence(steps) => {
                let step = if steps.len() > 1 {
                    steps.pop_front().flatten()
                } else {
                    steps.front().cloned().flatten()
                };
                step.ok_or_else(|| DetectionError::inference("scripted failure"))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}
