// ONNX Runtime backend for MoveNet single-pose models

use super::movenet::{decode_keypoints, to_nhwc_i32};
use crate::core::pose_detector::{finalize_poses, PoseDetector};
use crate::models::pose::{EstimationConfig, Pose, PoseError, PoseModel, PoseResult};
use async_trait::async_trait;
use image::RgbaImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct OnnxPoseDetector {
    session: Arc<Mutex<Session>>,
    model: PoseModel,
    input_size: u32,
    model_path: PathBuf,
}

impl OnnxPoseDetector {
    pub fn load(model_path: &Path, model: PoseModel, input_size: u32) -> PoseResult<Self> {
        if model != PoseModel::MoveNet {
            return Err(PoseError::ModelLoadFailed(format!(
                "ONNX backend only runs movenet, not {}",
                model.as_str()
            )));
        }

        let model_bytes = std::fs::read(model_path).map_err(|e| {
            PoseError::ModelLoadFailed(format!("read {}: {}", model_path.display(), e))
        })?;

        let session = Session::builder()
            .map_err(|e| PoseError::ModelLoadFailed(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PoseError::ModelLoadFailed(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| PoseError::ModelLoadFailed(format!("ORT load model: {e}")))?;

        info!(
            "Loaded {} ({}x{} input) from {}",
            model.as_str(),
            input_size,
            input_size,
            model_path.display()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            model,
            input_size,
            model_path: model_path.to_path_buf(),
        })
    }

    fn infer(
        session: &Mutex<Session>,
        input: Vec<i32>,
        size: usize,
        frame: (u32, u32),
    ) -> PoseResult<Pose> {
        let tensor = Tensor::from_array((vec![1usize, size, size, 3], input.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| PoseError::InferenceFailed(format!("ORT tensor: {e}")))?;

        let mut session = session
            .lock()
            .map_err(|_| PoseError::InferenceFailed("ORT session poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| PoseError::InferenceFailed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get("output_0")
            .ok_or_else(|| PoseError::InferenceFailed("ORT returned no output_0".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PoseError::InferenceFailed(format!("ORT extract: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        decode_keypoints(&dims, data, frame.0, frame.1)
    }
}

#[async_trait]
impl PoseDetector for OnnxPoseDetector {
    async fn estimate(
        &self,
        frame: &RgbaImage,
        config: &EstimationConfig,
    ) -> PoseResult<Vec<Pose>> {
        let input = to_nhwc_i32(frame, self.input_size);
        let size = self.input_size as usize;
        let dimensions = frame.dimensions();
        let session = Arc::clone(&self.session);

        let pose =
            tokio::task::spawn_blocking(move || Self::infer(&session, input, size, dimensions))
                .await
                .map_err(|e| PoseError::InferenceFailed(format!("inference task: {e}")))??;

        debug!("MoveNet pose score {:?}", pose.score);
        Ok(finalize_poses(vec![pose], self.model, dimensions.0, config))
    }

    fn model(&self) -> PoseModel {
        self.model
    }

    fn model_info(&self) -> String {
        format!(
            "ONNX Runtime {} ({}x{}) from {}",
            self.model.as_str(),
            self.input_size,
            self.input_size,
            self.model_path.display()
        )
    }
}
