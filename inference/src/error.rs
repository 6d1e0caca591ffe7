//! Error types for the hazard detection pipeline

use thiserror::Error;

/// Result type alias for the hazard detection library
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors that can occur while decoding, detecting or annotating frames
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to open video source: {0}")]
    SourceOpen(String),

    #[error("Failed to read frame: {0}")]
    SourceRead(String),

    #[error("No video source loaded")]
    NoSource,

    #[error("Seek fraction must be within [0, 1], got {0}")]
    InvalidSeek(f64),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    ModelInference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config file parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DetectionError {
    pub fn source_open<S: Into<String>>(msg: S) -> Self {
        Self::SourceOpen(msg.into())
    }

    pub fn source_read<S: Into<String>>(msg: S) -> Self {
        Self::SourceRead(msg.into())
    }

    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::ModelInference(msg.into())
    }

    pub fn postprocessing<S: Into<String>>(msg: S) -> Self {
        Self::ModelInference(format!("Postprocessing error: {}", msg.into()))
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for DetectionError {
    fn from(err: opencv::Error) -> Self {
        DetectionError::SourceRead(err.message)
    }
}
