// MoveNet single-pose tensor layout: input preparation and output decoding

use crate::models::pose::{Keypoint, Pose, PoseError, PoseResult};
use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Keypoints per MoveNet pose (COCO layout)
pub const MOVENET_KEYPOINTS: usize = 17;

/// Resize to a `size`x`size` square and flatten as NHWC int32 RGB
pub fn to_nhwc_i32(frame: &RgbaImage, size: u32) -> Vec<i32> {
    let resized = if frame.dimensions() == (size, size) {
        frame.clone()
    } else {
        imageops::resize(frame, size, size, FilterType::Triangle)
    };

    let mut data = Vec::with_capacity(size as usize * size as usize * 3);
    for pixel in resized.pixels() {
        let [r, g, b, _] = pixel.0;
        data.extend([r as i32, g as i32, b as i32]);
    }
    data
}

/// Decode a `[1, 1, 17, 3]` (or `[17, 3]`) output of normalised `(y, x, score)`
/// triples into a pose in frame pixel coordinates.
///
/// The pose score is the mean keypoint score.
pub fn decode_keypoints(
    shape: &[i64],
    data: &[f32],
    frame_width: u32,
    frame_height: u32,
) -> PoseResult<Pose> {
    let (points, stride) = match shape {
        [1, 1, points, stride] | [points, stride] => (*points as usize, *stride as usize),
        _ => {
            return Err(PoseError::InferenceFailed(format!(
                "Unexpected MoveNet output shape: {:?}",
                shape
            )))
        }
    };

    if points != MOVENET_KEYPOINTS || stride < 3 || data.len() < points * stride {
        return Err(PoseError::InferenceFailed(format!(
            "MoveNet output {:?} carries {} values",
            shape,
            data.len()
        )));
    }

    let keypoints: Vec<Keypoint> = data
        .chunks_exact(stride)
        .take(points)
        .map(|triple| {
            Keypoint::new(
                triple[1] * frame_width as f32,
                triple[0] * frame_height as f32,
                Some(triple[2]),
            )
        })
        .collect();

    let total: f32 = keypoints.iter().filter_map(|k| k.score).sum();
    Ok(Pose {
        score: Some(total / keypoints.len() as f32),
        keypoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_input_is_square_rgb_without_alpha() {
        let frame = RgbaImage::from_pixel(40, 20, Rgba([1, 2, 3, 200]));
        let data = to_nhwc_i32(&frame, 8);

        assert_eq!(data.len(), 8 * 8 * 3);
        assert_eq!(&data[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_decode_maps_to_frame_pixels() {
        let mut data = vec![0.0f32; MOVENET_KEYPOINTS * 3];
        // nose at (y=0.25, x=0.5)
        data[0] = 0.25;
        data[1] = 0.5;
        data[2] = 0.8;
        for chunk in data.chunks_exact_mut(3).skip(1) {
            chunk[2] = 0.4;
        }

        let pose = decode_keypoints(&[1, 1, 17, 3], &data, 640, 480).unwrap();

        assert_eq!(pose.keypoints.len(), 17);
        assert_eq!(pose.keypoints[0].x, 320.0);
        assert_eq!(pose.keypoints[0].y, 120.0);
        assert_eq!(pose.keypoints[0].score, Some(0.8));
        let expected = (0.8 + 16.0 * 0.4) / 17.0;
        assert!((pose.score.unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_decode_rejects_unexpected_shapes() {
        let data = vec![0.0f32; 51];
        assert!(decode_keypoints(&[1, 6, 56], &data, 10, 10).is_err());
        assert!(decode_keypoints(&[1, 1, 17, 3], &data[..20], 10, 10).is_err());
        assert!(decode_keypoints(&[17, 3], &data, 10, 10).is_ok());
    }
}
