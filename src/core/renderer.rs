// Skeleton overlay rendering onto fixed-size raster surfaces

use crate::models::pose::{Keypoint, PoseError, PoseResult};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

// ==============================================================================
// Presentation constants
// ==============================================================================

pub const KEYPOINT_RADIUS: i32 = 5;
pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([0xf9, 0x27, 0x4c, 0xff]);
pub const EDGE_WIDTH: u32 = 2;
pub const EDGE_COLOR: Rgba<u8> = Rgba([0x40, 0xe0, 0xd0, 0xff]);

// ==============================================================================
// Surface
// ==============================================================================

/// A fixed-size RGBA raster target
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> PoseResult<Self> {
        if width == 0 || height == 0 {
            return Err(PoseError::SurfaceUnavailable(format!(
                "cannot allocate a {}x{} surface",
                width, height
            )));
        }

        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Replace every pixel with `frame`, scaled to the surface size
    pub fn draw_background(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.image.dimensions() {
            self.image = frame.clone();
        } else {
            self.image = imageops::resize(frame, self.width(), self.height(), FilterType::Triangle);
        }
    }
}

/// Linear mapping from detector (staging) coordinates to output coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    pub fn between(from: (u32, u32), to: (u32, u32)) -> Self {
        Self {
            x: to.0 as f32 / from.0.max(1) as f32,
            y: to.1 as f32 / from.1.max(1) as f32,
        }
    }

    fn apply(&self, keypoint: &Keypoint) -> (f32, f32) {
        (keypoint.x * self.x, keypoint.y * self.y)
    }
}

// ==============================================================================
// Primitives
// ==============================================================================

/// Filled circle centred on (x, y). Circles entirely off the canvas are skipped.
pub fn draw_keypoint(canvas: &mut RgbaImage, x: f32, y: f32, radius: i32, color: Rgba<u8>) {
    if !x.is_finite() || !y.is_finite() {
        return;
    }

    let r = radius.max(0) as f32;
    let (width, height) = (canvas.width() as f32, canvas.height() as f32);
    if x < -r || y < -r || x > width + r || y > height + r {
        return;
    }

    draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
}

/// Liang-Barsky clip of segment `a`-`b` to the rectangle `min`..=`max`.
///
/// Returns `None` when no part of the segment lies inside.
pub fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    min: (f32, f32),
    max: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (dx, dy) = (b.0 as f64 - ax, b.1 as f64 - ay);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    let bounds = [
        (-dx, ax - min.0 as f64),
        (dx, max.0 as f64 - ax),
        (-dy, ay - min.1 as f64),
        (dy, max.1 as f64 - ay),
    ];
    for (p, q) in bounds {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }

        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }

    let at = |t: f64| ((ax + t * dx) as f32, (ay + t * dy) as f32);
    Some((at(t0), at(t1)))
}

/// Straight stroked segment from `a` to `b`, `width` pixels thick.
///
/// The segment is clipped to the canvas first, so far-off endpoints cost no
/// more than on-canvas ones.
pub fn draw_edge(
    canvas: &mut RgbaImage,
    a: (f32, f32),
    b: (f32, f32),
    color: Rgba<u8>,
    width: u32,
) {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return;
    }

    let margin = width as f32;
    let max = (
        canvas.width() as f32 - 1.0 + margin,
        canvas.height() as f32 - 1.0 + margin,
    );
    let Some((a, b)) = clip_segment(a, b, (-margin, -margin), max) else {
        return;
    };

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if width <= 1 || length < f32::EPSILON {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }

    // Unit normal; parallel 1px strokes spread across it give the width
    let (nx, ny) = (-dy / length, dx / length);
    let half = (width - 1) as f32 / 2.0;
    for step in 0..width {
        let offset = step as f32 - half;
        draw_line_segment_mut(
            canvas,
            (a.0 + nx * offset, a.1 + ny * offset),
            (b.0 + nx * offset, b.1 + ny * offset),
            color,
        );
    }
}

/// Draw surviving edges, then surviving keypoints on top of them.
///
/// Returns `(edges_drawn, keypoints_drawn)`.
pub fn render_overlay(
    surface: &mut Surface,
    edges: &[(&Keypoint, &Keypoint)],
    keypoints: &[&Keypoint],
    scale: Scale,
) -> (usize, usize) {
    let canvas = surface.image_mut();

    for (a, b) in edges {
        draw_edge(canvas, scale.apply(a), scale.apply(b), EDGE_COLOR, EDGE_WIDTH);
    }

    for keypoint in keypoints {
        let (x, y) = scale.apply(keypoint);
        draw_keypoint(canvas, x, y, KEYPOINT_RADIUS, KEYPOINT_COLOR);
    }

    (edges.len(), keypoints.len())
}
