// Data models for single-person 2-D pose estimation

use crate::models::capture::CaptureError;
use serde::{Deserialize, Serialize};

// ==============================================================================
// Keypoints and Poses
// ==============================================================================

/// A single anatomical landmark estimate in pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Confidence in [0, 1]; absent means the detector did not report one
    pub score: Option<f32>,
    pub name: Option<String>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: Option<f32>) -> Self {
        Self {
            x,
            y,
            score,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The full set of keypoints for one detected subject.
///
/// Index positions are meaningful: they follow the keypoint layout of the
/// model that produced the pose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    /// Pose-level confidence, when the detector reports one
    pub score: Option<f32>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            score: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }
}

/// A pair of keypoint indices considered skeletally connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge(pub usize, pub usize);

// ==============================================================================
// Model selection
// ==============================================================================

/// Supported pose-estimation model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseModel {
    /// 17 COCO keypoints
    PoseNet,
    /// 17 COCO keypoints
    MoveNet,
    /// 33 keypoints: COCO body plus face, hand and foot points
    BlazePose,
}

impl PoseModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoseModel::PoseNet => "posenet",
            PoseModel::MoveNet => "movenet",
            PoseModel::BlazePose => "blazepose",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "posenet" => Some(PoseModel::PoseNet),
            "movenet" => Some(PoseModel::MoveNet),
            "blazepose" => Some(PoseModel::BlazePose),
            _ => None,
        }
    }
}

/// Model size variant, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Lite,  // Fastest, least accurate
    Full,  // Balanced
    Heavy, // Slowest, most accurate
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Lite => "lite",
            ModelType::Full => "full",
            ModelType::Heavy => "heavy",
        }
    }
}

/// COCO keypoint layout shared by PoseNet and MoveNet (17 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CocoKeypoint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

/// BlazePose landmark layout (33 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

// ==============================================================================
// Estimation options
// ==============================================================================

/// Options passed to a detector on every estimation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Mirror keypoints horizontally (for mirrored webcam input)
    pub flip_horizontal: bool,
    /// Upper bound on returned poses (>= 1)
    pub max_poses: usize,
    /// Only poses scoring at least this value are returned
    pub score_threshold: f32,
    /// Minimum pixel separation between instances of the same keypoint
    pub nms_radius: f32,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            max_poses: 5,
            score_threshold: 0.5,
            nms_radius: 20.0,
        }
    }
}

impl EstimationConfig {
    /// Same options, capped to a single subject
    pub fn single_pose(&self) -> Self {
        Self {
            max_poses: 1,
            ..*self
        }
    }

    pub fn validate(&self) -> PoseResult<()> {
        if self.max_poses == 0 {
            return Err(PoseError::InvalidConfig(
                "max_poses must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid estimation score threshold: {}. Must be between 0.0 and 1.0",
                self.score_threshold
            )));
        }

        if !(self.nms_radius > 0.0) {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid nms_radius: {}. Must be positive",
                self.nms_radius
            )));
        }

        Ok(())
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose detection not initialized")]
    NotInitialized,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Drawing surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Frame source error: {0}")]
    Capture(#[from] CaptureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PoseResult<T> = Result<T, PoseError>;
