// Tracking loop - samples frames, runs the detector and renders the skeleton overlay

use crate::core::config::Config;
use crate::core::frame_sink::FrameSink;
use crate::core::frame_source::FrameSource;
use crate::core::pose_detector::PoseDetector;
use crate::core::pose_filter::{filter_edges, filter_keypoints};
use crate::core::renderer::{render_overlay, Scale, Surface};
use crate::core::tick_timer::TickTimer;
use crate::core::topology;
use crate::models::pose::{Edge, EstimationConfig, PoseModel, PoseResult};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

// ==============================================================================
// Session state
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    /// Initialised, no tick has run yet
    Idle,
    /// Ticks are running
    Tracking,
}

impl TrackingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingState::Idle => "idle",
            TrackingState::Tracking => "tracking",
        }
    }
}

/// Outcome of a single tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 1-based tick number
    pub tick: u64,
    /// False when the source had nothing to draw; nothing was rendered
    pub frame_available: bool,
    /// The detector returned an error and the tick rendered no pose
    pub detection_failed: bool,
    pub poses_detected: usize,
    pub keypoints_drawn: usize,
    pub edges_drawn: usize,
    pub elapsed: Duration,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            frame_available: false,
            detection_failed: false,
            poses_detected: 0,
            keypoints_drawn: 0,
            edges_drawn: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Running counters for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingStats {
    pub session_id: String,
    pub ticks: u64,
    pub frames_with_pose: u64,
    pub detection_failures: u64,
    pub frames_missing: u64,
    pub average_processing_time_ms: f32,
}

impl TrackingStats {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        if !report.frame_available {
            self.frames_missing += 1;
        }
        if report.detection_failed {
            self.detection_failures += 1;
        }
        if report.poses_detected > 0 {
            self.frames_with_pose += 1;
        }

        let elapsed_ms = report.elapsed.as_secs_f32() * 1000.0;
        self.average_processing_time_ms +=
            (elapsed_ms - self.average_processing_time_ms) / self.ticks as f32;
    }
}

// ==============================================================================
// Tracking session
// ==============================================================================

/// Owns everything one tracking loop touches.
///
/// Ticks never overlap: the next one is only scheduled once the current tick,
/// including its detector call, has finished.
pub struct TrackingSession {
    id: Uuid,
    source: Box<dyn FrameSource>,
    staging: Surface,
    output: Surface,
    detector: Box<dyn PoseDetector>,
    edges: &'static [Edge],
    score_threshold: f32,
    estimation: EstimationConfig,
    tick_interval: Duration,
    timer: TickTimer,
    sink: Option<Box<dyn FrameSink>>,
    stats: TrackingStats,
    state: TrackingState,
}

impl TrackingSession {
    pub fn new(
        config: &Config,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
    ) -> PoseResult<Self> {
        config.validate()?;

        let staging = Surface::new(config.staging_width, config.staging_height)?;
        let output = Surface::new(config.canvas_width, config.canvas_height)?;
        let id = Uuid::new_v4();

        info!(
            "Tracking session {} created: source {}, detector {}, output {}x{}",
            id,
            source.describe(),
            detector.model_info(),
            output.width(),
            output.height()
        );

        Ok(Self {
            id,
            source,
            staging,
            output,
            edges: topology::adjacent_pairs(detector.model()),
            detector,
            score_threshold: config.score_threshold,
            estimation: config.estimation.single_pose(),
            tick_interval: config.tick_interval(),
            timer: TickTimer::new(),
            sink: None,
            stats: TrackingStats {
                session_id: id.to_string(),
                ..TrackingStats::default()
            },
            state: TrackingState::Idle,
        })
    }

    /// Hand every rendered output frame to `sink`
    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn stats(&self) -> &TrackingStats {
        &self.stats
    }

    /// Active model, as reported by the installed detector
    pub fn model(&self) -> PoseModel {
        self.detector.model()
    }

    /// The rendered output surface
    pub fn output(&self) -> &RgbaImage {
        self.output.image()
    }

    /// Whether a next tick is scheduled
    pub fn tick_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Install a different detector, switching the skeleton topology with it
    pub fn replace_detector(&mut self, detector: Box<dyn PoseDetector>) {
        info!(
            "Session {}: replacing {} with {}",
            self.id,
            self.detector.model_info(),
            detector.model_info()
        );
        self.edges = topology::adjacent_pairs(detector.model());
        self.detector = detector;
    }

    /// Run one tick and schedule the next one.
    ///
    /// Detection failures are logged and rendered as "no pose"; they never
    /// end the session.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.state = TrackingState::Tracking;
        let mut report = TickReport::new(self.stats.ticks + 1);

        let frame = match self.source.current_frame() {
            Some(raw) => match raw.to_rgba_image() {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("Tick {}: skipping undecodable frame: {}", report.tick, e);
                    None
                }
            },
            None => {
                debug!("Tick {}: no frame available yet", report.tick);
                None
            }
        };

        if let Some(frame) = frame {
            report.frame_available = true;
            self.render_frame(&frame, &mut report).await;
        }

        report.elapsed = started.elapsed();

        if report.frame_available {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.publish(self.output.image(), &report).await {
                    warn!("Tick {}: failed to publish output frame: {}", report.tick, e);
                }
            }
        }

        self.stats.record(&report);
        self.timer.schedule(self.tick_interval);
        report
    }

    async fn render_frame(&mut self, frame: &RgbaImage, report: &mut TickReport) {
        self.staging.draw_background(frame);
        self.output.draw_background(frame);

        let poses = match self
            .detector
            .estimate(self.staging.image(), &self.estimation)
            .await
        {
            Ok(poses) => poses,
            Err(e) => {
                warn!("Tick {}: pose estimation failed: {}", report.tick, e);
                report.detection_failed = true;
                Vec::new()
            }
        };
        report.poses_detected = poses.len();

        let pose = poses.into_iter().next().unwrap_or_default();
        let edges = filter_edges(&pose, self.edges, self.score_threshold);
        let keypoints = filter_keypoints(&pose, self.score_threshold);
        let scale = Scale::between(self.staging.dimensions(), self.output.dimensions());

        let (edges_drawn, keypoints_drawn) =
            render_overlay(&mut self.output, &edges, &keypoints, scale);
        report.edges_drawn = edges_drawn;
        report.keypoints_drawn = keypoints_drawn;

        debug!(
            "Tick {}: {} pose(s), {} keypoints, {} edges",
            report.tick, report.poses_detected, keypoints_drawn, edges_drawn
        );
    }

    /// Tick until `shutdown` turns true or its sender goes away.
    ///
    /// The pending timer is cancelled on exit.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Session {} tracking every {:?} with {}",
            self.id,
            self.tick_interval,
            self.model().as_str()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;

            let closed = tokio::select! {
                _ = self.timer.fired() => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if closed || *shutdown.borrow() {
                break;
            }
        }

        self.timer.cancel();
        info!(
            "Session {} stopped while {} after {} ticks ({} with a pose, {} detection failures)",
            self.id,
            self.state.as_str(),
            self.stats.ticks,
            self.stats.frames_with_pose,
            self.stats.detection_failures
        );
    }

    /// Move the session onto its own task
    pub fn spawn(mut self) -> TrackingHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let span = info_span!("tracking", session = %self.id);

        let task = tokio::spawn(
            async move {
                self.run(shutdown_rx).await;
                self.stats.clone()
            }
            .instrument(span),
        );

        TrackingHandle {
            task,
            shutdown: shutdown_tx,
        }
    }
}

/// Handle to a spawned tracking session
pub struct TrackingHandle {
    task: JoinHandle<TrackingStats>,
    shutdown: watch::Sender<bool>,
}

impl TrackingHandle {
    /// Stop the loop and wait for it to release its detector and source.
    ///
    /// A tick already in progress runs to completion first.
    pub async fn shutdown(self) -> Result<TrackingStats, JoinError> {
        self.shutdown.send_replace(true);
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame_sink::watch_sink;
    use crate::core::frame_source::{live_source, StillImageSource};
    use crate::core::renderer::{EDGE_COLOR, KEYPOINT_COLOR};
    use crate::models::capture::RawFrame;
    use crate::models::pose::{Keypoint, Pose, PoseError};
    use async_trait::async_trait;
    use image::Rgba;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// Replays scripted results, then keeps returning no pose
    struct ScriptedDetector {
        model: PoseModel,
        script: Mutex<VecDeque<PoseResult<Vec<Pose>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedDetector {
        fn new(model: PoseModel, script: Vec<PoseResult<Vec<Pose>>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let detector = Self {
                model,
                script: Mutex::new(script.into()),
                calls: Arc::clone(&calls),
            };
            (detector, calls)
        }
    }

    #[async_trait]
    impl PoseDetector for ScriptedDetector {
        async fn estimate(
            &self,
            _frame: &RgbaImage,
            config: &EstimationConfig,
        ) -> PoseResult<Vec<Pose>> {
            assert_eq!(config.max_poses, 1);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn model(&self) -> PoseModel {
            self.model
        }

        fn model_info(&self) -> String {
            format!("scripted {}", self.model.as_str())
        }
    }

    fn kp(x: f32, y: f32, score: f32) -> Keypoint {
        Keypoint::new(x, y, Some(score))
    }

    fn black_source() -> Box<dyn FrameSource> {
        Box::new(StillImageSource::from_image(RgbaImage::from_pixel(
            480, 480, BACKGROUND,
        )))
    }

    fn session_with(script: Vec<PoseResult<Vec<Pose>>>) -> (TrackingSession, Arc<AtomicUsize>) {
        let (detector, calls) = ScriptedDetector::new(PoseModel::PoseNet, script);
        let session =
            TrackingSession::new(&Config::default(), black_source(), Box::new(detector)).unwrap();
        (session, calls)
    }

    fn count(image: &RgbaImage, color: Rgba<u8>) -> usize {
        image.pixels().filter(|p| **p == color).count()
    }

    #[tokio::test]
    async fn test_low_score_keypoint_drops_edge_and_point() {
        let pose = Pose::new(vec![kp(0.0, 0.0, 0.9), kp(10.0, 10.0, 0.4)]);
        let (mut session, _) = session_with(vec![Ok(vec![pose])]);

        let report = session.tick().await;

        assert_eq!((report.edges_drawn, report.keypoints_drawn), (0, 1));
        let output = session.output();
        assert_eq!(*output.get_pixel(0, 0), KEYPOINT_COLOR);
        assert_eq!(*output.get_pixel(10, 10), BACKGROUND);
        assert_eq!(count(output, EDGE_COLOR), 0);
    }

    #[tokio::test]
    async fn test_threshold_score_draws_edge_but_not_point() {
        let pose = Pose::new(vec![kp(100.0, 100.0, 0.5), kp(200.0, 100.0, 0.9)]);
        let (mut session, _) = session_with(vec![Ok(vec![pose])]);

        let report = session.tick().await;

        assert_eq!((report.edges_drawn, report.keypoints_drawn), (1, 1));
        let output = session.output();
        assert_eq!(*output.get_pixel(200, 100), KEYPOINT_COLOR);
        assert!((99..=101).any(|y| *output.get_pixel(150, y) == EDGE_COLOR));
        // Inside where a circle at (100, 100) would be, away from the edge
        assert_eq!(*output.get_pixel(100, 104), BACKGROUND);
    }

    #[tokio::test]
    async fn test_empty_pose_redraws_background_only() {
        let pose = Pose::new(vec![kp(50.0, 50.0, 0.9), kp(80.0, 50.0, 0.9)]);
        let (mut session, _) = session_with(vec![Ok(vec![pose]), Ok(Vec::new())]);

        session.tick().await;
        assert!(count(session.output(), KEYPOINT_COLOR) > 0);

        let report = session.tick().await;
        assert_eq!(report.poses_detected, 0);
        assert_eq!((report.edges_drawn, report.keypoints_drawn), (0, 0));
        assert_eq!(count(session.output(), BACKGROUND), 480 * 480);
    }

    #[tokio::test]
    async fn test_only_first_pose_is_drawn() {
        let first = Pose::new(vec![kp(20.0, 20.0, 0.9)]);
        let second = Pose::new(vec![kp(300.0, 300.0, 0.9)]);
        let (mut session, _) = session_with(vec![Ok(vec![first, second])]);

        let report = session.tick().await;

        assert_eq!(report.poses_detected, 2);
        assert_eq!(report.keypoints_drawn, 1);
        assert_eq!(*session.output().get_pixel(20, 20), KEYPOINT_COLOR);
        assert_eq!(*session.output().get_pixel(300, 300), BACKGROUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_failure_does_not_stop_next_tick() {
        let pose = Pose::new(vec![kp(40.0, 40.0, 0.9)]);
        let (mut session, calls) = session_with(vec![
            Err(PoseError::InferenceFailed("model crashed".to_string())),
            Ok(vec![pose]),
        ]);

        let start = Instant::now();
        let failed = session.tick().await;
        assert!(failed.detection_failed);
        assert!(failed.frame_available);
        assert!(session.tick_pending());
        assert_eq!(count(session.output(), BACKGROUND), 480 * 480);

        session.timer.fired().await;
        assert!(start.elapsed() >= Duration::from_millis(50));

        let recovered = session.tick().await;
        assert!(!recovered.detection_failed);
        assert_eq!(recovered.keypoints_drawn, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.stats().detection_failures, 1);
        assert_eq!(session.stats().frames_with_pose, 1);
    }

    #[tokio::test]
    async fn test_no_frame_is_a_noop_tick() {
        let (source, publisher) = live_source(480, 480);
        let (detector, calls) = ScriptedDetector::new(PoseModel::PoseNet, Vec::new());
        let mut session =
            TrackingSession::new(&Config::default(), Box::new(source), Box::new(detector)).unwrap();

        let report = session.tick().await;
        assert!(!report.frame_available);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.stats().frames_missing, 1);
        assert!(session.tick_pending());

        publisher
            .publish(RawFrame::from_rgba(RgbaImage::from_pixel(480, 480, BACKGROUND)))
            .unwrap();
        let report = session.tick().await;
        assert!(report.frame_available);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keypoints_scaled_from_staging_to_output() {
        let config = Config {
            staging_width: 240,
            staging_height: 240,
            ..Config::default()
        };
        let pose = Pose::new(vec![kp(100.0, 50.0, 0.9)]);
        let (detector, _) = ScriptedDetector::new(PoseModel::PoseNet, vec![Ok(vec![pose])]);
        let mut session =
            TrackingSession::new(&config, black_source(), Box::new(detector)).unwrap();

        session.tick().await;

        assert_eq!(*session.output().get_pixel(200, 100), KEYPOINT_COLOR);
        assert_eq!(*session.output().get_pixel(100, 50), BACKGROUND);
    }

    #[tokio::test]
    async fn test_state_and_topology() {
        let (mut session, _) = session_with(Vec::new());
        assert_eq!(session.state(), TrackingState::Idle);
        assert_eq!(session.state().as_str(), "idle");
        assert_eq!(session.model(), PoseModel::PoseNet);
        assert_eq!(session.edges.len(), 16);

        session.tick().await;
        assert_eq!(session.state(), TrackingState::Tracking);

        let (blaze, _) = ScriptedDetector::new(PoseModel::BlazePose, Vec::new());
        session.replace_detector(Box::new(blaze));
        assert_eq!(session.model(), PoseModel::BlazePose);
        assert_eq!(session.edges.len(), 35);
    }

    #[tokio::test]
    async fn test_invalid_surface_size_fails_initialisation() {
        let config = Config {
            canvas_width: 0,
            ..Config::default()
        };
        let (detector, _) = ScriptedDetector::new(PoseModel::PoseNet, Vec::new());
        let result = TrackingSession::new(&config, black_source(), Box::new(detector));
        assert!(matches!(result, Err(PoseError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_output_is_published_to_sink() {
        let (sink, mut viewer) = watch_sink();
        let pose = Pose::new(vec![kp(5.0, 5.0, 1.0)]);
        let (session, _) = session_with(vec![Ok(vec![pose])]);
        let mut session = session.with_sink(Box::new(sink));

        session.tick().await;

        viewer.changed().await.unwrap();
        let frame = viewer.borrow_and_update().clone().unwrap();
        assert_eq!(*frame.get_pixel(5, 5), KEYPOINT_COLOR);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_session_ticks_until_shutdown() {
        let (session, calls) = session_with(vec![Err(PoseError::NotInitialized)]);
        let handle = session.spawn();

        tokio::time::sleep(Duration::from_millis(120)).await;
        let stats = handle.shutdown().await.unwrap();

        assert!(stats.ticks >= 2);
        assert_eq!(stats.detection_failures, 1);
        assert_eq!(calls.load(Ordering::SeqCst) as u64, stats.ticks);

        // Nothing keeps running once the handle has resolved
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst) as u64, stats.ticks);
    }
}
