// Inference backends for pose estimation

pub mod pose;
