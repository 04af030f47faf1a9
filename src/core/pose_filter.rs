// Confidence filtering for keypoints and skeleton edges

use crate::models::pose::{Edge, Keypoint, Pose};
use tracing::trace;

/// Threshold shared by the keypoint and edge filters
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// Confidence of a keypoint, treating a missing score as full confidence
pub fn resolve_score(keypoint: &Keypoint) -> f32 {
    keypoint.score.unwrap_or(1.0)
}

/// Endpoint pairs of every edge whose two keypoints both score `>= threshold`.
///
/// Edges that reference an index the pose does not have are skipped.
pub fn filter_edges<'a>(
    pose: &'a Pose,
    edges: &[Edge],
    threshold: f32,
) -> Vec<(&'a Keypoint, &'a Keypoint)> {
    edges
        .iter()
        .filter_map(|&Edge(i, j)| {
            let (a, b) = match (pose.keypoint(i), pose.keypoint(j)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    if !pose.is_empty() {
                        trace!("Skipping edge ({}, {}): keypoint missing", i, j);
                    }
                    return None;
                }
            };

            if resolve_score(a) >= threshold && resolve_score(b) >= threshold {
                Some((a, b))
            } else {
                None
            }
        })
        .collect()
}

/// Keypoints whose score is strictly greater than `threshold`.
///
/// Note the strict comparison: a keypoint scoring exactly `threshold` is not
/// drawn as a point, yet still satisfies the `>=` test of `filter_edges`.
pub fn filter_keypoints(pose: &Pose, threshold: f32) -> Vec<&Keypoint> {
    pose.keypoints
        .iter()
        .filter(|kp| resolve_score(kp) > threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(x: f32, y: f32, score: Option<f32>) -> Keypoint {
        Keypoint::new(x, y, score)
    }

    #[test]
    fn test_missing_score_resolves_to_one() {
        let keypoint = kp(0.0, 0.0, None);
        assert_eq!(resolve_score(&keypoint), 1.0);
        assert_eq!(resolve_score(&keypoint), resolve_score(&keypoint));
        assert_eq!(resolve_score(&kp(0.0, 0.0, Some(0.3))), 0.3);
    }

    #[test]
    fn test_low_scoring_endpoint_removes_edge() {
        let pose = Pose::new(vec![kp(0.0, 0.0, Some(0.9)), kp(10.0, 10.0, Some(0.4))]);
        let edges = [Edge(0, 1)];

        assert!(filter_edges(&pose, &edges, 0.5).is_empty());

        let keypoints = filter_keypoints(&pose, 0.5);
        assert_eq!(keypoints.len(), 1);
        assert_eq!((keypoints[0].x, keypoints[0].y), (0.0, 0.0));
    }

    #[test]
    fn test_edge_rule_depends_on_both_endpoints() {
        let edges = [Edge(0, 1)];

        let both_high = Pose::new(vec![kp(0.0, 0.0, Some(0.8)), kp(1.0, 1.0, Some(0.6))]);
        assert_eq!(filter_edges(&both_high, &edges, 0.5).len(), 1);

        let first_low = Pose::new(vec![kp(0.0, 0.0, Some(0.1)), kp(1.0, 1.0, Some(1.0))]);
        assert!(filter_edges(&first_low, &edges, 0.5).is_empty());

        let second_low = Pose::new(vec![kp(0.0, 0.0, Some(1.0)), kp(1.0, 1.0, Some(0.1))]);
        assert!(filter_edges(&second_low, &edges, 0.5).is_empty());
    }

    #[test]
    fn test_score_equal_to_threshold() {
        let pose = Pose::new(vec![kp(0.0, 0.0, Some(0.5)), kp(5.0, 5.0, Some(0.9))]);

        let keypoints = filter_keypoints(&pose, 0.5);
        assert_eq!(keypoints.len(), 1);
        assert_eq!(keypoints[0].score, Some(0.9));

        let edges = filter_edges(&pose, &[Edge(0, 1)], 0.5);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0.score, Some(0.5));
    }

    #[test]
    fn test_unscored_keypoints_pass_both_filters() {
        let pose = Pose::new(vec![kp(0.0, 0.0, None), kp(3.0, 4.0, None)]);
        assert_eq!(filter_keypoints(&pose, 0.5).len(), 2);
        assert_eq!(filter_edges(&pose, &[Edge(0, 1)], 0.5).len(), 1);
    }

    #[test]
    fn test_missing_index_skips_only_that_edge() {
        let pose = Pose::new(vec![kp(0.0, 0.0, Some(0.9)), kp(1.0, 1.0, Some(0.9))]);
        let edges = [Edge(0, 7), Edge(0, 1), Edge(9, 1)];

        let kept = filter_edges(&pose, &edges, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].1.x, 1.0);
    }

    #[test]
    fn test_empty_pose_yields_nothing() {
        let pose = Pose::default();
        assert!(filter_edges(&pose, &[Edge(0, 1), Edge(1, 2)], 0.5).is_empty());
        assert!(filter_keypoints(&pose, 0.5).is_empty());
    }

    #[test]
    fn test_filters_leave_pose_untouched() {
        let pose = Pose::new(vec![kp(0.0, 0.0, Some(0.2)), kp(1.0, 1.0, None)]);
        let before = pose.clone();
        let _ = filter_edges(&pose, &[Edge(0, 1)], DEFAULT_SCORE_THRESHOLD);
        let _ = filter_keypoints(&pose, DEFAULT_SCORE_THRESHOLD);
        assert_eq!(pose, before);
    }
}
