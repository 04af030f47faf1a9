// Skeleton topology: which keypoint pairs are connected for each model

use crate::models::pose::{BodyLandmark as B, CocoKeypoint as C, Edge, PoseModel};

const fn coco(a: C, b: C) -> Edge {
    Edge(a as usize, b as usize)
}

const fn blaze(a: B, b: B) -> Edge {
    Edge(a as usize, b as usize)
}

/// Connected pairs of the 17-point COCO layout
pub static COCO_ADJACENT_PAIRS: [Edge; 16] = [
    coco(C::Nose, C::LeftEye),
    coco(C::Nose, C::RightEye),
    coco(C::LeftEye, C::LeftEar),
    coco(C::RightEye, C::RightEar),
    coco(C::LeftShoulder, C::RightShoulder),
    coco(C::LeftShoulder, C::LeftElbow),
    coco(C::LeftShoulder, C::LeftHip),
    coco(C::RightShoulder, C::RightElbow),
    coco(C::RightShoulder, C::RightHip),
    coco(C::LeftElbow, C::LeftWrist),
    coco(C::RightElbow, C::RightWrist),
    coco(C::LeftHip, C::RightHip),
    coco(C::LeftHip, C::LeftKnee),
    coco(C::RightHip, C::RightKnee),
    coco(C::LeftKnee, C::LeftAnkle),
    coco(C::RightKnee, C::RightAnkle),
];

/// Connected pairs of the 33-point BlazePose layout
pub static BLAZEPOSE_ADJACENT_PAIRS: [Edge; 35] = [
    // Face
    blaze(B::Nose, B::LeftEyeInner),
    blaze(B::Nose, B::RightEyeInner),
    blaze(B::LeftEyeInner, B::LeftEye),
    blaze(B::LeftEye, B::LeftEyeOuter),
    blaze(B::LeftEyeOuter, B::LeftEar),
    blaze(B::RightEyeInner, B::RightEye),
    blaze(B::RightEye, B::RightEyeOuter),
    blaze(B::RightEyeOuter, B::RightEar),
    blaze(B::MouthLeft, B::MouthRight),
    // Torso and arms
    blaze(B::LeftShoulder, B::RightShoulder),
    blaze(B::LeftShoulder, B::LeftElbow),
    blaze(B::LeftShoulder, B::LeftHip),
    blaze(B::RightShoulder, B::RightElbow),
    blaze(B::RightElbow, B::RightWrist),
    blaze(B::RightShoulder, B::RightHip),
    blaze(B::LeftElbow, B::LeftWrist),
    // Hands
    blaze(B::LeftWrist, B::LeftPinky),
    blaze(B::RightWrist, B::RightPinky),
    blaze(B::RightWrist, B::RightIndex),
    blaze(B::LeftWrist, B::LeftIndex),
    blaze(B::LeftWrist, B::LeftThumb),
    blaze(B::RightWrist, B::RightThumb),
    blaze(B::LeftPinky, B::LeftIndex),
    blaze(B::RightPinky, B::RightIndex),
    // Legs and feet
    blaze(B::LeftHip, B::LeftKnee),
    blaze(B::LeftHip, B::RightHip),
    blaze(B::RightHip, B::RightKnee),
    blaze(B::LeftKnee, B::LeftAnkle),
    blaze(B::RightKnee, B::RightAnkle),
    blaze(B::LeftAnkle, B::LeftHeel),
    blaze(B::RightAnkle, B::RightHeel),
    blaze(B::LeftAnkle, B::LeftFootIndex),
    blaze(B::RightAnkle, B::RightFootIndex),
    blaze(B::LeftHeel, B::LeftFootIndex),
    blaze(B::RightHeel, B::RightFootIndex),
];

static COCO_KEYPOINT_NAMES: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

static BLAZEPOSE_KEYPOINT_NAMES: [&str; 33] = [
    "nose",
    "left_eye_inner",
    "left_eye",
    "left_eye_outer",
    "right_eye_inner",
    "right_eye",
    "right_eye_outer",
    "left_ear",
    "right_ear",
    "mouth_left",
    "mouth_right",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_pinky",
    "right_pinky",
    "left_index",
    "right_index",
    "left_thumb",
    "right_thumb",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
    "left_heel",
    "right_heel",
    "left_foot_index",
    "right_foot_index",
];

/// Keypoint index pairs drawn as skeleton segments for `model`.
///
/// Returns the same static slice on every call.
pub fn adjacent_pairs(model: PoseModel) -> &'static [Edge] {
    match model {
        PoseModel::PoseNet | PoseModel::MoveNet => &COCO_ADJACENT_PAIRS,
        PoseModel::BlazePose => &BLAZEPOSE_ADJACENT_PAIRS,
    }
}

/// Keypoint names in index order
pub fn keypoint_names(model: PoseModel) -> &'static [&'static str] {
    match model {
        PoseModel::PoseNet | PoseModel::MoveNet => &COCO_KEYPOINT_NAMES,
        PoseModel::BlazePose => &BLAZEPOSE_KEYPOINT_NAMES,
    }
}

pub fn keypoint_count(model: PoseModel) -> usize {
    keypoint_names(model).len()
}

/// Index of the keypoint called `name`, if the model has one
pub fn keypoint_index(model: PoseModel, name: &str) -> Option<usize> {
    keypoint_names(model).iter().position(|n| *n == name)
}
