// Pose estimation backends

pub mod movenet;

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend;

#[cfg(feature = "ml-onnx")]
pub use onnx_backend::OnnxPoseDetector;
