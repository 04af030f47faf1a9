// Data structures for frame acquisition

use image::RgbaImage;

/// A single frame taken from a frame source
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel format of source frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA8,
    BGRA8,
}

impl RawFrame {
    /// Wrap an already decoded RGBA image, stamped with the current time
    pub fn from_rgba(image: RgbaImage) -> Self {
        let width = image.width();
        let height = image.height();

        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data: image.into_raw(),
            format: PixelFormat::RGBA8,
        }
    }

    /// Convert the frame into an RGBA image buffer
    pub fn to_rgba_image(&self) -> CaptureResult<RgbaImage> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.data.len() != expected {
            return Err(CaptureError::MalformedFrame(format!(
                "{}x{} frame carries {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                expected
            )));
        }

        let rgba_data = match self.format {
            PixelFormat::BGRA8 => {
                let mut rgba = Vec::with_capacity(self.data.len());
                for chunk in self.data.chunks_exact(4) {
                    rgba.push(chunk[2]); // R
                    rgba.push(chunk[1]); // G
                    rgba.push(chunk[0]); // B
                    rgba.push(chunk[3]); // A
                }
                rgba
            }
            PixelFormat::RGBA8 => self.data.clone(),
        };

        RgbaImage::from_raw(self.width, self.height, rgba_data).ok_or_else(|| {
            CaptureError::MalformedFrame("Failed to create image buffer".to_string())
        })
    }
}

/// Error types for frame acquisition
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Frame source not found: {0}")]
    SourceNotFound(String),

    #[error("Failed to decode frame source: {0}")]
    DecodeFailed(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Frame size {got_width}x{got_height} does not match source size {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    #[error("Frame source has no frames")]
    Empty,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
