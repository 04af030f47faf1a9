// Data models for frame capture and pose estimation

pub mod capture;
pub mod pose;
