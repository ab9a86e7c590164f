use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Closed HSV interval using the 8-bit convention: H in 0..=179, S and V in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl ColorRange {
    pub fn new(low: [u8; 3], high: [u8; 3]) -> Self {
        Self { low, high }
    }

    /// Inclusive on all three channels
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.low[c] && hsv[c] <= self.high[c])
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        // Blue-purple header bars of the target form
        Self::new([110, 40, 180], [125, 255, 255])
    }
}

/// Thresholds of the two-bar shape check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarSignature {
    /// Fraction of the box width a row must cover to count as a bar row
    pub row_coverage: f32,
    /// Minimum consecutive bar rows for a thick bar
    pub min_thickness: u32,
    /// Minimum gap in rows between the first and last thick bar
    pub min_gap: u32,
}

impl Default for BarSignature {
    fn default() -> Self {
        Self {
            row_coverage: 0.70,
            min_thickness: 10,
            min_gap: 50,
        }
    }
}

/// Detector and state machine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub color_range: ColorRange,

    /// Minimum filled area in pixels
    pub min_area: u64,

    /// Maximum filled area in pixels (None = unbounded)
    pub max_area: Option<u64>,

    /// Accepted width/height ratio range
    pub aspect_min: f64,
    pub aspect_max: f64,

    #[serde(default)]
    pub bars: BarSignature,

    /// Continuous presence required before capturing
    pub presence_confirm_secs: f64,

    /// Continuous absence required before the form counts as gone
    pub absence_confirm_secs: f64,

    /// Quiet period after the form disappeared
    pub cooldown_secs: f64,

    /// Tick period of the watch loop
    pub poll_interval_secs: f64,

    /// Consecutive matched ticks needed to reset a running disappearance timer
    #[serde(default = "default_reappear_ticks")]
    pub reappear_ticks: u32,
}

/// Negative or non-finite values (rejected by `validate`) map to zero
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn default_reappear_ticks() -> u32 {
    1
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            color_range: ColorRange::default(),
            min_area: 30_000,
            max_area: Some(200_000),
            aspect_min: 1.0,
            aspect_max: 2.0,
            bars: BarSignature::default(),
            presence_confirm_secs: 3.0,
            absence_confirm_secs: 2.0,
            cooldown_secs: 5.0,
            poll_interval_secs: 0.5,
            reappear_ticks: default_reappear_ticks(),
        }
    }
}

impl DetectionConfig {
    pub fn presence_confirm(&self) -> Duration {
        secs_to_duration(self.presence_confirm_secs)
    }

    pub fn absence_confirm(&self) -> Duration {
        secs_to_duration(self.absence_confirm_secs)
    }

    pub fn cooldown(&self) -> Duration {
        secs_to_duration(self.cooldown_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        secs_to_duration(self.poll_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = &self.color_range;
        if (0..3).any(|c| range.low[c] > range.high[c]) {
            return Err(ConfigError::Invalid(format!(
                "color range low {:?} exceeds high {:?}",
                range.low, range.high
            )));
        }
        if range.high[0] > 179 {
            return Err(ConfigError::Invalid(format!(
                "hue upper bound {} exceeds 179",
                range.high[0]
            )));
        }
        if self.min_area == 0 {
            return Err(ConfigError::Invalid("min_area must be > 0".into()));
        }
        if let Some(max_area) = self.max_area {
            if max_area < self.min_area {
                return Err(ConfigError::Invalid(format!(
                    "max_area {} is below min_area {}",
                    max_area, self.min_area
                )));
            }
        }
        if !(self.aspect_min > 0.0 && self.aspect_min <= self.aspect_max) {
            return Err(ConfigError::Invalid(format!(
                "aspect range {}..={} must satisfy 0 < min <= max",
                self.aspect_min, self.aspect_max
            )));
        }
        if !(self.bars.row_coverage > 0.0 && self.bars.row_coverage <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "bar row coverage {} must be in (0, 1]",
                self.bars.row_coverage
            )));
        }
        if self.bars.min_thickness == 0 {
            return Err(ConfigError::Invalid("bar min_thickness must be > 0".into()));
        }
        for (name, secs) in [
            ("presence_confirm_secs", self.presence_confirm_secs),
            ("absence_confirm_secs", self.absence_confirm_secs),
            ("cooldown_secs", self.cooldown_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, secs
                )));
            }
        }
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_secs must be > 0, got {}",
                self.poll_interval_secs
            )));
        }
        if self.reappear_ticks == 0 {
            return Err(ConfigError::Invalid("reappear_ticks must be >= 1".into()));
        }
        Ok(())
    }
}

/// Which screen area to sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Index into the display list (0 = first display)
    #[serde(default)]
    pub monitor_index: usize,

    /// Optional sub-region [x, y, width, height]; None = full display
    #[serde(default)]
    pub region: Option<[u32; 4]>,
}

/// Where and how captures are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,

    /// File extension, "png" or "jpg"
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("screenshots"),
            format: "png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Begin in the paused state; toggle with the pause hotkey
    #[serde(default)]
    pub start_paused: bool,
}

impl Config {
    /// Load configuration from the default location next to the executable.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.validate()?;

            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;

        if let Some(region) = self.capture.region {
            if region[2] == 0 || region[3] == 0 {
                return Err(ConfigError::Invalid(format!(
                    "capture region {:?} must have non-zero width and height",
                    region
                )));
            }
        }

        match self.output.format.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "output format '{}' is not png or jpg",
                other
            ))),
        }
    }

    /// Get the config file path (in app's base directory)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let exe_path = env::current_exe().map_err(|e| ConfigError::LoadFailed {
            path: "<current exe>".to_string(),
            source: Box::new(e),
        })?;
        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("Could not determine executable directory".into()))?;

        Ok(exe_dir.join("config").join("config.json"))
    }
}
