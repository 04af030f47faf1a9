use crate::core::pose_filter::DEFAULT_SCORE_THRESHOLD;
use crate::models::pose::{EstimationConfig, ModelType, PoseError, PoseModel, PoseResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Pose model family: "posenet", "movenet" or "blazepose"
    pub model: PoseModel,
    /// Model size variant: "lite", "full" or "heavy"
    pub model_type: ModelType,
    /// Directory holding model files
    pub model_dir: PathBuf,
    /// Image or GIF to track; live sources are wired in code instead
    pub source_path: Option<PathBuf>,
    /// Resolution frames are scaled to before detection
    pub staging_width: u32,
    pub staging_height: u32,
    /// Resolution of the rendered output
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Delay between the end of one tick and the start of the next
    pub tick_interval_ms: u64,
    /// Keypoint/edge confidence threshold (0.0-1.0)
    pub score_threshold: f32,
    /// Options passed to the detector on every call
    pub estimation: EstimationConfig,
    /// When set, each rendered frame is written here as PNG
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut model_dir = home_dir();
        model_dir.push(".posetrack");
        model_dir.push("models");

        Self {
            model: PoseModel::PoseNet,
            model_type: ModelType::Full,
            model_dir,
            source_path: None,
            staging_width: 480,
            staging_height: 480,
            canvas_width: 480,
            canvas_height: 480,
            tick_interval_ms: 50,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            estimation: EstimationConfig::default(),
            output_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it with defaults if missing
    pub fn load() -> PoseResult<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: impl AsRef<Path>) -> PoseResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> PoseResult<()> {
        self.save_to(Self::config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> PoseResult<()> {
        self.validate()?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> PoseResult<()> {
        if self.staging_width == 0 || self.staging_height == 0 {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid staging size: {}x{}. Both dimensions must be non-zero",
                self.staging_width, self.staging_height
            )));
        }

        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid canvas size: {}x{}. Both dimensions must be non-zero",
                self.canvas_width, self.canvas_height
            )));
        }

        if self.tick_interval_ms == 0 || self.tick_interval_ms > 10_000 {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid tick interval: {}ms. Must be between 1 and 10000",
                self.tick_interval_ms
            )));
        }

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(PoseError::InvalidConfig(format!(
                "Invalid score threshold: {}. Must be between 0.0 and 1.0",
                self.score_threshold
            )));
        }

        self.estimation.validate()
    }

    /// Reset the stored configuration to defaults
    pub fn reset() -> PoseResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        let mut path = home_dir();
        path.push(".posetrack");
        path.push("config");
        path.push("settings.json");
        path
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
