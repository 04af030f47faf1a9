// Frame sources - still images, animations and externally fed live frames

use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// GIF frames declaring a zero delay are shown for this long instead
const ZERO_DELAY_FALLBACK: Duration = Duration::from_millis(100);

/// A drawable frame source of fixed, known size
pub trait FrameSource: Send + Sync {
    /// Native width and height of the frames this source produces
    fn dimensions(&self) -> (u32, u32);

    /// Snapshot of the current frame, or `None` if nothing has been produced yet
    fn current_frame(&self) -> Option<RawFrame>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Open a frame source from a file, choosing the decoder by extension
pub fn open_frame_source(path: impl AsRef<Path>) -> CaptureResult<Box<dyn FrameSource>> {
    let path = path.as_ref();
    let is_gif = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gif"))
        .unwrap_or(false);

    if is_gif {
        Ok(Box::new(AnimatedSource::open_gif(path)?))
    } else {
        Ok(Box::new(StillImageSource::open(path)?))
    }
}

fn ensure_exists(path: &Path) -> CaptureResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(CaptureError::SourceNotFound(path.display().to_string()))
    }
}

// ==============================================================================
// Still image
// ==============================================================================

/// A single decoded image, served on every tick
pub struct StillImageSource {
    frame: RawFrame,
    label: String,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;

        let image = image::open(path)
            .map_err(|e| CaptureError::DecodeFailed(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        let mut source = Self::from_image(image);
        source.label = format!("image {}", path.display());
        Ok(source)
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let label = format!("image {}x{}", image.width(), image.height());
        Self {
            frame: RawFrame::from_rgba(image),
            label,
        }
    }
}

impl FrameSource for StillImageSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn current_frame(&self) -> Option<RawFrame> {
        let mut frame = self.frame.clone();
        frame.timestamp = chrono::Utc::now().timestamp_millis();
        Some(frame)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

// ==============================================================================
// Animation
// ==============================================================================

/// Looping animation; the current frame is picked by time since opening
pub struct AnimatedSource {
    frames: Vec<(RawFrame, Duration)>,
    total: Duration,
    started: Instant,
    width: u32,
    height: u32,
}

impl AnimatedSource {
    pub fn open_gif(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;

        let file = File::open(path)
            .map_err(|e| CaptureError::SourceNotFound(format!("{}: {}", path.display(), e)))?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .map_err(|e| CaptureError::DecodeFailed(format!("{}: {}", path.display(), e)))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| CaptureError::DecodeFailed(format!("{}: {}", path.display(), e)))?;

        let frames = frames
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let millis = numer as f64 / denom.max(1) as f64;
                (frame.into_buffer(), Duration::from_secs_f64(millis / 1000.0))
            })
            .collect();

        Self::from_frames(frames)
    }

    /// Build an animation from decoded frames and their display durations
    pub fn from_frames(frames: Vec<(RgbaImage, Duration)>) -> CaptureResult<Self> {
        let (width, height) = frames
            .first()
            .map(|(image, _)| image.dimensions())
            .ok_or(CaptureError::Empty)?;

        let mut total = Duration::ZERO;
        let mut timed = Vec::with_capacity(frames.len());
        for (image, delay) in frames {
            if image.dimensions() != (width, height) {
                return Err(CaptureError::DimensionMismatch {
                    width,
                    height,
                    got_width: image.width(),
                    got_height: image.height(),
                });
            }

            let delay = if delay.is_zero() {
                ZERO_DELAY_FALLBACK
            } else {
                delay
            };
            total += delay;
            timed.push((RawFrame::from_rgba(image), delay));
        }

        Ok(Self {
            frames: timed,
            total,
            started: Instant::now(),
            width,
            height,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn index_at(&self, elapsed: Duration) -> usize {
        let mut position = elapsed.as_nanos() % self.total.as_nanos().max(1);
        for (index, (_, delay)) in self.frames.iter().enumerate() {
            if position < delay.as_nanos() {
                return index;
            }
            position -= delay.as_nanos();
        }
        self.frames.len() - 1
    }
}

impl FrameSource for AnimatedSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> Option<RawFrame> {
        let index = self.index_at(self.started.elapsed());
        let mut frame = self.frames.get(index)?.0.clone();
        frame.timestamp = chrono::Utc::now().timestamp_millis();
        Some(frame)
    }

    fn describe(&self) -> String {
        format!(
            "animation {}x{} ({} frames, {:?} loop)",
            self.width,
            self.height,
            self.frames.len(),
            self.total
        )
    }
}

// ==============================================================================
// Live frames
// ==============================================================================

/// Latest frame pushed by an external producer such as a camera or video decoder
pub struct LiveFrameSource {
    width: u32,
    height: u32,
    latest: watch::Receiver<Option<Arc<RawFrame>>>,
}

/// Producer half of a [`LiveFrameSource`]
#[derive(Clone)]
pub struct LiveFramePublisher {
    width: u32,
    height: u32,
    latest: Arc<watch::Sender<Option<Arc<RawFrame>>>>,
}

/// Create a live source of fixed size together with its publisher
pub fn live_source(width: u32, height: u32) -> (LiveFrameSource, LiveFramePublisher) {
    let (tx, rx) = watch::channel(None);
    (
        LiveFrameSource {
            width,
            height,
            latest: rx,
        },
        LiveFramePublisher {
            width,
            height,
            latest: Arc::new(tx),
        },
    )
}

impl LiveFramePublisher {
    /// Replace the current frame. Frames of the wrong size are rejected.
    pub fn publish(&self, frame: RawFrame) -> CaptureResult<()> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(CaptureError::DimensionMismatch {
                width: self.width,
                height: self.height,
                got_width: frame.width,
                got_height: frame.height,
            });
        }

        self.latest.send_replace(Some(Arc::new(frame)));
        Ok(())
    }
}

impl FrameSource for LiveFrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> Option<RawFrame> {
        self.latest.borrow().as_deref().cloned()
    }

    fn describe(&self) -> String {
        format!("live {}x{}", self.width, self.height)
    }
}
