// Pose detector abstraction and backend selection

use crate::core::config::Config;
use crate::core::ml_models::ModelManager;
use crate::core::topology;
use crate::models::pose::{EstimationConfig, Pose, PoseModel, PoseResult};
use async_trait::async_trait;
use image::RgbaImage;
use tracing::warn;

/// A pose-estimation model ready to run on frames.
///
/// Implementations return poses ranked best first, with keypoints in the
/// pixel space of the frame they were given and indexed by the model's
/// keypoint layout.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    async fn estimate(&self, frame: &RgbaImage, config: &EstimationConfig) -> PoseResult<Vec<Pose>>;

    /// Model family, which fixes the keypoint layout and skeleton edges
    fn model(&self) -> PoseModel;

    fn model_info(&self) -> String;
}

/// Build the detector selected by `config`.
///
/// Any failure here is fatal to the tracker.
pub async fn create_detector(
    config: &Config,
    manager: &ModelManager,
) -> PoseResult<Box<dyn PoseDetector>> {
    #[cfg(feature = "ml-onnx")]
    {
        use crate::core::ml_models::model_info;
        use crate::platform::pose::OnnxPoseDetector;

        let info = model_info(config.model, config.model_type)?;
        let path = manager.ensure_model(&info).await?;
        let detector = OnnxPoseDetector::load(&path, config.model, info.input_size)?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "ml-onnx"))]
    {
        let _ = manager;
        Ok(Box::new(NullPoseDetector::new(config.model)))
    }
}

/// Apply the caller's estimation options to raw detector output.
///
/// `frame_width` is the width of the frame the keypoints are expressed in.
pub fn finalize_poses(
    mut poses: Vec<Pose>,
    model: PoseModel,
    frame_width: u32,
    config: &EstimationConfig,
) -> Vec<Pose> {
    let names = topology::keypoint_names(model);

    for pose in poses.iter_mut() {
        for (index, keypoint) in pose.keypoints.iter_mut().enumerate() {
            if config.flip_horizontal {
                keypoint.x = frame_width as f32 - keypoint.x;
            }
            if keypoint.name.is_none() {
                keypoint.name = names.get(index).map(|n| n.to_string());
            }
        }
    }

    poses.retain(|pose| pose.score.map_or(true, |s| s >= config.score_threshold));
    poses.truncate(config.max_poses);
    poses
}

// ==============================================================================
// Null detector (no ML backend compiled in)
// ==============================================================================

/// Detector that never finds anyone; used when no inference backend is enabled
pub struct NullPoseDetector {
    model: PoseModel,
}

impl NullPoseDetector {
    pub fn new(model: PoseModel) -> Self {
        warn!(
            "No inference backend compiled in, {} detections will always be empty. \
             Enable the 'ml-onnx' feature for real inference",
            model.as_str()
        );
        Self { model }
    }
}

#[async_trait]
impl PoseDetector for NullPoseDetector {
    async fn estimate(
        &self,
        _frame: &RgbaImage,
        _config: &EstimationConfig,
    ) -> PoseResult<Vec<Pose>> {
        Ok(Vec::new())
    }

    fn model(&self) -> PoseModel {
        self.model
    }

    fn model_info(&self) -> String {
        format!("Null detector for {} (no ML inference)", self.model.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::Keypoint;

    fn pose(score: Option<f32>, xs: &[f32]) -> Pose {
        Pose {
            keypoints: xs.iter().map(|&x| Keypoint::new(x, 1.0, Some(0.9))).collect(),
            score,
        }
    }

    #[tokio::test]
    async fn test_null_detector_finds_nothing() {
        let detector = NullPoseDetector::new(PoseModel::BlazePose);
        let frame = RgbaImage::new(8, 8);

        let poses = detector
            .estimate(&frame, &EstimationConfig::default())
            .await
            .unwrap();

        assert!(poses.is_empty());
        assert_eq!(detector.model(), PoseModel::BlazePose);
        assert!(detector.model_info().contains("blazepose"));
    }

    #[cfg(not(feature = "ml-onnx"))]
    #[tokio::test]
    async fn test_create_detector_without_backend() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let config = Config {
            model: PoseModel::MoveNet,
            ..Config::default()
        };

        let detector = create_detector(&config, &manager).await.unwrap();
        assert_eq!(detector.model(), PoseModel::MoveNet);
    }

    #[test]
    fn test_finalize_respects_max_poses_and_threshold() {
        let poses = vec![
            pose(Some(0.9), &[1.0]),
            pose(Some(0.2), &[2.0]),
            pose(None, &[3.0]),
            pose(Some(0.7), &[4.0]),
        ];
        let config = EstimationConfig::default().single_pose();

        let kept = finalize_poses(poses, PoseModel::MoveNet, 100, &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].keypoints[0].x, 1.0);
    }

    #[test]
    fn test_finalize_flips_and_names_keypoints() {
        let config = EstimationConfig {
            flip_horizontal: true,
            ..EstimationConfig::default()
        };

        let poses = vec![pose(None, &[10.0, 30.0])];
        let kept = finalize_poses(poses, PoseModel::PoseNet, 100, &config);
        let keypoints = &kept[0].keypoints;
        assert_eq!(keypoints[0].x, 90.0);
        assert_eq!(keypoints[1].x, 70.0);
        assert_eq!(keypoints[0].name.as_deref(), Some("nose"));
        assert_eq!(keypoints[1].name.as_deref(), Some("left_eye"));
    }
}
