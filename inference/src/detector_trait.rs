/// Unified detector interface and the per-category detector registry
///
/// Every hazard category owns one model. The pipeline only sees the
/// [`Detector`] trait, so ONNX models and scripted detectors are interchangeable.
use crate::config::{CategorySettings, HazardConfig};
use crate::error::{DetectionError, Result};
use crate::types::{Category, Detection};
use image::RgbImage;
use log::info;
use std::collections::HashMap;

/// Common interface for object detectors
pub trait Detector: Send {
    /// Detect objects in a single frame
    ///
    /// Boxes are in the frame's pixel coordinates. Results are not filtered by
    /// category thresholds; the renderer applies those.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Get the detector name (for logging/debugging)
    fn name(&self) -> &str;

    /// Get the input size expected by the detector
    fn input_size(&self) -> (u32, u32);
}

/// Detector type enum for selecting which detector to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorType {
    /// YOLOv8 ONNX model (requires the `onnx` feature)
    YoloV8,
    /// Scripted detector returning no detections, for running without models
    Scripted,
}

impl DetectorType {
    /// Create a detector instance of this type for one category
    pub fn create(
        &self,
        settings: &CategorySettings,
        config: &HazardConfig,
    ) -> Result<Box<dyn Detector>> {
        match self {
            DetectorType::YoloV8 => create_yolov8(settings, config),
            DetectorType::Scripted => {
                let detector = crate::detector_stub::ScriptedDetector::empty()
                    .named(format!("scripted-{}", settings.category))
                    .with_input_size(config.detector.input_size);
                Ok(Box::new(detector))
            }
        }
    }
}

#[cfg(feature = "onnx")]
fn create_yolov8(settings: &CategorySettings, config: &HazardConfig) -> Result<Box<dyn Detector>> {
    let detector = crate::detector_yolov8::YoloV8Detector::new(settings, &config.detector)?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
fn create_yolov8(settings: &CategorySettings, _config: &HazardConfig) -> Result<Box<dyn Detector>> {
    Err(DetectionError::config(format!(
        "Cannot load {}: ONNX support not compiled in (enable the `onnx` feature)",
        settings.model_path.display()
    )))
}

/// One detector per category
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: HashMap<Category, Box<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build detectors for the given categories from configuration
    ///
    /// Fails on the first model that cannot be loaded.
    pub fn from_config(
        config: &HazardConfig,
        kind: DetectorType,
        categories: &[Category],
    ) -> Result<Self> {
        let mut registry = Self::new();
        for &category in categories {
            let settings = config.category(category);
            let detector = kind.create(&settings, config)?;
            info!(
                "Loaded {} detector '{}' ({} classes)",
                category,
                detector.name(),
                settings.class_names.len()
            );
            registry.insert(category, detector);
        }
        Ok(registry)
    }

    /// Register a detector, replacing any previous one for the category
    pub fn insert(&mut self, category: Category, detector: Box<dyn Detector>) {
        self.detectors.insert(category, detector);
    }

    pub fn contains(&self, category: Category) -> bool {
        self.detectors.contains_key(&category)
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run the category's detector on a frame
    pub fn detect(&mut self, category: Category, image: &RgbImage) -> Result<Vec<Detection>> {
        let detector = self.detectors.get_mut(&category).ok_or_else(|| {
            DetectionError::inference(format!("No detector loaded for category '{}'", category))
        })?;
        detector.detect(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector_stub::ScriptedDetector;
    use crate::types::BoundingBox;

    #[test]
    fn test_registry_dispatch() {
        let mut registry = DetectorRegistry::new();
        let gun = Detection::new(0, "gun", 0.9, BoundingBox::new(1.0, 1.0, 5.0, 5.0));
        registry.insert(
            Category::Weapon,
            Box::new(ScriptedDetector::fixed(vec![gun.clone()])),
        );

        let frame = RgbImage::new(8, 8);
        assert_eq!(registry.detect(Category::Weapon, &frame).unwrap(), vec![gun]);
        assert!(registry.contains(Category::Weapon));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_missing_category() {
        let mut registry = DetectorRegistry::new();
        let frame = RgbImage::new(8, 8);
        match registry.detect(Category::Fire, &frame) {
            Err(DetectionError::ModelInference(msg)) => assert!(msg.contains("fire")),
            other => panic!("Expected ModelInference, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_scripted() {
        let config = HazardConfig::default();
        let registry =
            DetectorRegistry::from_config(&config, DetectorType::Scripted, &Category::ALL).unwrap();
        assert_eq!(registry.len(), 5);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_yolov8_requires_onnx_feature() {
        let config = HazardConfig::default();
        let result = DetectorRegistry::from_config(&config, DetectorType::YoloV8, &[Category::Crowd]);
        assert!(matches!(result, Err(DetectionError::Config(_))));
    }
}
