//! YOLOv8 detector using ONNX Runtime
//!
//! Loads one exported YOLOv8 model per hazard category. Frames are resized to
//! the model input, normalized to a CHW tensor, and the `[1, 4 + nc, N]` output
//! is decoded back into frame pixel coordinates with class-aware NMS.

use crate::config::{CategorySettings, DetectorConfig};
use crate::detector_trait::Detector;
use crate::error::{DetectionError, Result};
use crate::types::{BoundingBox, Detection};
use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, info, warn};
use ndarray::{Array, ArrayView, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::path::Path;

/// YOLOv8 detector for one category model
pub struct YoloV8Detector {
    session: Session,
    config: DetectorConfig,
    class_names: Vec<String>,
    name: String,
}

impl YoloV8Detector {
    /// Load the category's model, trying the GPU providers first when requested
    pub fn new(settings: &CategorySettings, config: &DetectorConfig) -> Result<Self> {
        let model_path = settings.model_path.as_path();
        if !model_path.exists() {
            return Err(DetectionError::model_load(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        info!(
            "Initializing ONNX Runtime detector for {} from {}",
            settings.category,
            model_path.display()
        );

        let session = Self::create_session(model_path, config)?;

        Ok(Self {
            session,
            config: config.clone(),
            class_names: settings.class_names.clone(),
            name: format!("yolov8-{}", settings.category),
        })
    }

    fn create_session(model_path: &Path, config: &DetectorConfig) -> Result<Session> {
        if config.use_gpu {
            #[cfg(feature = "cuda")]
            {
                match Self::try_create_cuda_session(model_path, config) {
                    Ok(session) => {
                        info!("Model loaded with CUDA (device {})", config.gpu_device_id);
                        return Ok(session);
                    }
                    Err(e) => warn!("CUDA initialization failed: {}", e),
                }
            }

            #[cfg(feature = "tensorrt")]
            {
                match Self::try_create_tensorrt_session(model_path, config) {
                    Ok(session) => {
                        info!("Model loaded with TensorRT (device {})", config.gpu_device_id);
                        return Ok(session);
                    }
                    Err(e) => warn!("TensorRT initialization failed: {}", e),
                }
            }

            #[cfg(not(any(feature = "cuda", feature = "tensorrt")))]
            warn!("No GPU backend feature enabled (cuda/tensorrt), falling back to CPU");
        }

        let session = Self::create_cpu_session(model_path, config)?;
        info!("Model loaded with CPU");
        Ok(session)
    }

    #[cfg(feature = "cuda")]
    fn try_create_cuda_session(model_path: &Path, config: &DetectorConfig) -> Result<Session> {
        use ort::execution_providers::CUDAExecutionProvider;

        Session::builder()
            .map_err(|e| DetectionError::model_load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectionError::model_load(e.to_string()))?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(config.gpu_device_id)
                .build()])
            .map_err(|e| DetectionError::model_load(format!("CUDA provider failed: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| DetectionError::model_load(format!("Failed to load model with CUDA: {}", e)))
    }

    #[cfg(feature = "tensorrt")]
    fn try_create_tensorrt_session(model_path: &Path, config: &DetectorConfig) -> Result<Session> {
        use ort::execution_providers::TensorRTExecutionProvider;

        Session::builder()
            .map_err(|e| DetectionError::model_load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectionError::model_load(e.to_string()))?
            .with_execution_providers([TensorRTExecutionProvider::default()
                .with_device_id(config.gpu_device_id)
                .with_fp16(true)
                .build()])
            .map_err(|e| DetectionError::model_load(format!("TensorRT provider failed: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| {
                DetectionError::model_load(format!("Failed to load model with TensorRT: {}", e))
            })
    }

    fn create_cpu_session(model_path: &Path, config: &DetectorConfig) -> Result<Session> {
        let mut builder = Session::builder()
            .map_err(|e| DetectionError::model_load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectionError::model_load(e.to_string()))?;

        if config.num_threads > 0 {
            builder = builder
                .with_intra_threads(config.num_threads)
                .map_err(|e| DetectionError::model_load(e.to_string()))?;
        }

        builder
            .commit_from_file(model_path)
            .map_err(|e| DetectionError::model_load(format!("Failed to load model: {}", e)))
    }

    /// Resize to the model input, normalize to [0, 1], CHW layout `[1, 3, H, W]`
    fn preprocess(&self, image: &RgbImage) -> Array<f32, IxDyn> {
        let (in_w, in_h) = self.config.input_size;
        let resized = image::imageops::resize(image, in_w, in_h, FilterType::Triangle);

        let mut input = Array::zeros((1, 3, in_h as usize, in_w as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        input.into_dyn()
    }

    fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    /// Decode YOLOv8 output and apply NMS
    ///
    /// Output layout is `[1, 4 + nc, N]`: center x, center y, width, height in
    /// model input pixels, then one score per class.
    fn postprocess(
        &self,
        output: ArrayView<f32, IxDyn>,
        orig_w: u32,
        orig_h: u32,
    ) -> Result<Vec<Detection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(DetectionError::postprocessing(format!(
                "Unexpected output shape: {:?}",
                shape
            )));
        }

        let num_classes = shape[1] - 4;
        let num_boxes = shape[2];
        let (in_w, in_h) = self.config.input_size;
        let scale_x = orig_w as f32 / in_w as f32;
        let scale_y = orig_h as f32 / in_h as f32;

        let mut candidates = Vec::new();
        for i in 0..num_boxes {
            let mut best_score = 0.0f32;
            let mut best_class = 0usize;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, i]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.config.min_confidence {
                continue;
            }

            let bbox = BoundingBox::from_center(
                output[[0, 0, i]] * scale_x,
                output[[0, 1, i]] * scale_y,
                output[[0, 2, i]] * scale_x,
                output[[0, 3, i]] * scale_y,
            )
            .clamp_to(orig_w, orig_h);

            if !bbox.is_valid() {
                continue;
            }

            candidates.push(Detection::new(
                best_class as u32,
                self.class_name(best_class),
                best_score,
                bbox,
            ));
        }

        Ok(non_max_suppression(candidates, self.config.nms_threshold))
    }
}

/// Class-aware non-maximum suppression, highest confidence first
pub(crate) fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

impl Detector for YoloV8Detector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        debug!(
            "{}: detection on {}x{} frame",
            self.name,
            image.width(),
            image.height()
        );

        let input = self.preprocess(image);

        let tensor_ref = TensorRef::from_array_view(&input)
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| DetectionError::inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::postprocessing(e.to_string()))?
            .into_owned();
        drop(outputs);

        let detections = self.postprocess(output.view(), image.width(), image.height())?;
        debug!("{}: {} candidates after NMS", self.name, detections.len());
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> (u32, u32) {
        self.config.input_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32, x1: f32) -> Detection {
        Detection::new(
            class_id,
            "x",
            confidence,
            BoundingBox::new(x1, 0.0, x1 + 10.0, 10.0),
        )
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let kept = non_max_suppression(
            vec![det(0, 0.6, 1.0), det(0, 0.9, 0.0), det(0, 0.5, 50.0)],
            0.45,
        );
        let scores: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(scores, vec![0.9, 0.5]);
    }

    #[test]
    fn test_nms_keeps_other_classes() {
        let kept = non_max_suppression(vec![det(0, 0.9, 0.0), det(1, 0.8, 0.0)], 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_missing_model_file() {
        let settings = CategorySettings {
            category: crate::types::Category::Fire,
            model_path: "/nonexistent/fire.onnx".into(),
            class_names: vec!["fire".into()],
            threshold: 0.2,
            discovery_threshold: None,
        };
        let result = YoloV8Detector::new(&settings, &DetectorConfig::default());
        assert!(matches!(result, Err(DetectionError::ModelLoad(_))));
    }
}
