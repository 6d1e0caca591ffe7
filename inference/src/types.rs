//! Type definitions for hazard detection

use crate::error::DetectionError;
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hazard category selected by the operator.
///
/// Each category owns exactly one detector, one threshold set and one
/// rendering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Crowd,
    Fire,
    Smoking,
    Vehicle,
    Weapon,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Crowd,
        Category::Fire,
        Category::Smoking,
        Category::Vehicle,
        Category::Weapon,
    ];

    /// Short lowercase key used in configuration and commands
    pub fn key(&self) -> &'static str {
        match self {
            Self::Crowd => "crowd",
            Self::Fire => "fire",
            Self::Smoking => "smoking",
            Self::Vehicle => "vehicle",
            Self::Weapon => "weapon",
        }
    }

    /// Human readable name shown in the category indicator
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Crowd => "Crowd Detection",
            Self::Fire => "Fire Detection",
            Self::Smoking => "Smoking Detection",
            Self::Vehicle => "Vehicle Detection",
            Self::Weapon => "Weapon Detection",
        }
    }

    /// Indicator panel color (RGB)
    pub fn indicator_color(&self) -> Rgb<u8> {
        match self {
            Self::Crowd => Rgb([0, 255, 0]),
            Self::Fire => Rgb([255, 69, 0]),
            Self::Smoking => Rgb([0, 0, 255]),
            Self::Vehicle => Rgb([0, 255, 255]),
            Self::Weapon => Rgb([255, 0, 0]),
        }
    }

    // Compact encoding for atomics; 0 is reserved for "no category".
    pub(crate) fn code(&self) -> u8 {
        match self {
            Self::Crowd => 1,
            Self::Fire => 2,
            Self::Smoking => 3,
            Self::Vehicle => 4,
            Self::Weapon => 5,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Crowd),
            2 => Some(Self::Fire),
            3 => Some(Self::Smoking),
            4 => Some(Self::Vehicle),
            5 => Some(Self::Weapon),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Category {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crowd" => Ok(Self::Crowd),
            "fire" => Ok(Self::Fire),
            "smoking" => Ok(Self::Smoking),
            "vehicle" => Ok(Self::Vehicle),
            "weapon" => Ok(Self::Weapon),
            other => Err(DetectionError::config(format!(
                "Unknown category '{}' (expected crowd, fire, smoking, vehicle or weapon)",
                other
            ))),
        }
    }
}

/// Axis-aligned bounding box in pixel coordinates (corner form)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from center point and size, as emitted by YOLO heads
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// True when all coordinates are finite and the box has positive extent
    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x1 < self.x2
            && self.y1 < self.y2
    }

    /// Overlap area, zero for disjoint boxes
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }
        intersection / union
    }

    /// Clip the box to image bounds
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    /// Integer pixel corners (truncated toward zero)
    pub fn to_pixels(&self) -> (i32, i32, i32, i32) {
        (
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        )
    }
}

/// Single detection produced by a detector for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    /// Confidence score (0-1)
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(
        class_id: u32,
        class_name: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Player state of the playback controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

impl PlayerState {
    pub(crate) fn code(&self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Playing => 1,
            Self::Paused => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
        };
        write!(f, "{}", name)
    }
}
