// Tracking pipeline: frame acquisition, detection, filtering and rendering

pub mod config;
pub mod frame_source;
pub mod frame_sink;
pub mod ml_models;
pub mod tick_timer;
pub mod tracking_loop;

// Pose estimation
pub mod pose_detector;
pub mod pose_filter;
pub mod topology;

// Drawing
pub mod renderer;
