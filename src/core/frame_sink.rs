// Destinations for rendered output frames

use crate::core::tracking_loop::TickReport;
use crate::models::pose::{PoseError, PoseResult};
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Receives the output surface after every rendered tick.
///
/// Called from inside the tracking loop; slow work belongs on the blocking pool.
#[async_trait]
pub trait FrameSink: Send {
    async fn publish(&mut self, surface: &RgbaImage, report: &TickReport) -> PoseResult<()>;
}

// ==============================================================================
// PNG sequence
// ==============================================================================

/// Writes each rendered frame as `frame_NNNNNN.png`, numbered by tick
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> PoseResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, tick: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", tick))
    }
}

#[async_trait]
impl FrameSink for PngSequenceSink {
    async fn publish(&mut self, surface: &RgbaImage, report: &TickReport) -> PoseResult<()> {
        let path = self.frame_path(report.tick);
        let frame = surface.clone();

        // PNG encoding is CPU bound; keep it off the runtime threads
        let target = path.clone();
        tokio::task::spawn_blocking(move || frame.save(&target))
            .await
            .map_err(|e| PoseError::Io(std::io::Error::other(e)))??;

        self.written += 1;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

// ==============================================================================
// Watch channel
// ==============================================================================

/// Shares the latest rendered frame with any number of in-process viewers
pub struct WatchSink {
    latest: watch::Sender<Option<Arc<RgbaImage>>>,
}

/// Create a sink together with a receiver for the latest frame
pub fn watch_sink() -> (WatchSink, watch::Receiver<Option<Arc<RgbaImage>>>) {
    let (tx, rx) = watch::channel(None);
    (WatchSink { latest: tx }, rx)
}

impl WatchSink {
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RgbaImage>>> {
        self.latest.subscribe()
    }
}

#[async_trait]
impl FrameSink for WatchSink {
    async fn publish(&mut self, surface: &RgbaImage, _report: &TickReport) -> PoseResult<()> {
        // Viewers may come and go; a frame with nobody watching is simply dropped
        self.latest.send_replace(Some(Arc::new(surface.clone())));
        Ok(())
    }
}
