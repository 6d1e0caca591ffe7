//! Configuration for the hazard detection pipeline
//!
//! Every field has a default so an empty TOML file (or no file at all) yields
//! a working setup that mirrors the stock model set.

use crate::annotation::Thresholds;
use crate::error::{DetectionError, Result};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub playback: PlaybackConfig,
    pub detector: DetectorConfig,
    pub capture: CaptureConfig,
    pub categories: CategoriesConfig,
}

/// Frame loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frame rate used when a source reports none (cameras, image folders)
    pub default_fps: f64,
    /// Pace the loop to the source frame rate
    pub realtime: bool,
    /// Sleep between checks while a seek is in progress
    pub seek_poll_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_fps: 25.0,
            realtime: true,
            seek_poll_ms: 5,
        }
    }
}

/// Settings shared by all ONNX detectors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Model input size (width, height)
    pub input_size: (u32, u32),
    /// Non-maximum suppression IoU threshold (0-1)
    pub nms_threshold: f32,
    /// Candidates below this score are dropped before NMS
    pub min_confidence: f32,
    /// Use GPU acceleration if a GPU execution provider is compiled in
    pub use_gpu: bool,
    pub gpu_device_id: i32,
    /// Intra-op threads for CPU inference, 0 keeps the runtime default
    pub num_threads: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: (640, 640),
            nms_threshold: 0.45,
            min_confidence: 0.1,
            use_gpu: false,
            gpu_device_id: 0,
            num_threads: 0,
        }
    }
}

/// Snapshot export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub directory: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("screenshots"),
        }
    }
}

/// Per-category overrides; unset fields fall back to the category defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOverrides {
    pub model_path: Option<PathBuf>,
    pub class_names: Option<Vec<String>>,
    pub threshold: Option<f32>,
    /// Smoking only: score needed for a face/smoking box to take part in suppression
    pub discovery_threshold: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    pub crowd: CategoryOverrides,
    pub fire: CategoryOverrides,
    pub smoking: CategoryOverrides,
    pub vehicle: CategoryOverrides,
    pub weapon: CategoryOverrides,
}

impl CategoriesConfig {
    pub fn get(&self, category: Category) -> &CategoryOverrides {
        match category {
            Category::Crowd => &self.crowd,
            Category::Fire => &self.fire,
            Category::Smoking => &self.smoking,
            Category::Vehicle => &self.vehicle,
            Category::Weapon => &self.weapon,
        }
    }
}

/// Fully resolved settings for one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySettings {
    pub category: Category,
    pub model_path: PathBuf,
    pub class_names: Vec<String>,
    pub threshold: f32,
    pub discovery_threshold: Option<f32>,
}

fn default_model_path(category: Category) -> PathBuf {
    match category {
        Category::Crowd => PathBuf::from("models/crowd-density-model.onnx"),
        other => PathBuf::from(format!("models/{}-detection-model.onnx", other.key())),
    }
}

fn default_class_names(category: Category) -> Vec<String> {
    let names: &[&str] = match category {
        Category::Crowd => &["person"],
        Category::Fire => &["fire", "smoke"],
        Category::Smoking => &["cigarette", "face", "smoking"],
        Category::Vehicle => &[
            "car",
            "big bus",
            "bus-l-",
            "bus-s-",
            "small bus",
            "truck-xl-",
            "big truck",
            "truck-l-",
            "mid truck",
            "truck-m-",
            "small truck",
            "truck-s-",
        ],
        Category::Weapon => &["gun"],
    };
    names.iter().map(|s| s.to_string()).collect()
}

impl HazardConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DetectionError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: HazardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve a category's settings, filling unset fields with defaults
    pub fn category(&self, category: Category) -> CategorySettings {
        let defaults = Thresholds::default();
        let overrides = self.categories.get(category);
        let discovery_threshold = match category {
            Category::Smoking => Some(
                overrides
                    .discovery_threshold
                    .unwrap_or(defaults.smoking_discovery),
            ),
            _ => None,
        };

        CategorySettings {
            category,
            model_path: overrides
                .model_path
                .clone()
                .unwrap_or_else(|| default_model_path(category)),
            class_names: overrides
                .class_names
                .clone()
                .unwrap_or_else(|| default_class_names(category)),
            threshold: overrides.threshold.unwrap_or(defaults.get(category)),
            discovery_threshold,
        }
    }

    /// Rendering thresholds for all categories
    pub fn thresholds(&self) -> Thresholds {
        let mut thresholds = Thresholds::default();
        for category in Category::ALL {
            let settings = self.category(category);
            thresholds.set(category, settings.threshold);
            if let Some(discovery) = settings.discovery_threshold {
                thresholds.smoking_discovery = discovery;
            }
        }
        thresholds
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.playback.default_fps.is_finite() && self.playback.default_fps > 0.0) {
            return Err(DetectionError::config("playback.default_fps must be positive"));
        }
        if self.playback.default_fps > 1000.0 {
            return Err(DetectionError::config("playback.default_fps too large (max 1000)"));
        }

        let (w, h) = self.detector.input_size;
        if w == 0 || h == 0 {
            return Err(DetectionError::config("detector.input_size must be non-zero"));
        }
        check_unit("detector.nms_threshold", self.detector.nms_threshold)?;
        check_unit("detector.min_confidence", self.detector.min_confidence)?;

        for category in Category::ALL {
            let overrides = self.categories.get(category);
            if let Some(t) = overrides.threshold {
                check_unit(&format!("categories.{}.threshold", category), t)?;
            }
            if let Some(t) = overrides.discovery_threshold {
                check_unit(&format!("categories.{}.discovery_threshold", category), t)?;
            }
            if let Some(names) = &overrides.class_names {
                if names.is_empty() {
                    return Err(DetectionError::config(format!(
                        "categories.{}.class_names must not be empty",
                        category
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectionError::config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
