use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Highest accepted capture rate. Sets the shortest broadcast period.
pub const MAX_FPS: u32 = 1000;

/// Static settings record, loaded once at start-up and read-only afterwards.
/// Every field has a default so a partial file is enough.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub camera: CameraSettings,
    pub hand_tracking: HandTrackingSettings,
    pub gesture_sensitivity: SensitivityConfig,
    #[serde(alias = "websocket")]
    pub transport: TransportSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    /// Capture rate. Also sets the broadcast period.
    pub fps: u32,
}

/// Forwarded to the detector; the server itself only uses `max_hands` and
/// `detection_confidence` when picking a hand out of a frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HandTrackingSettings {
    pub max_hands: usize,
    pub detection_confidence: f32,
    pub tracking_confidence: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SensitivityConfig {
    pub rotation_multiplier: f64,
    /// Not applied: translation is reported unscaled in -1..1.
    pub translation_multiplier: f64,
    /// Not applied: zoom is reported as 0.5 or 1.0.
    pub zoom_multiplier: f64,
    /// Thumb/index tip distance below which the hand counts as pinching.
    pub pinch_threshold: f64,
    pub smoothing: SmoothingSettings,
}

/// Reserved. Parsed and validated but no smoothing is applied.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SmoothingSettings {
    pub rotation: f64,
    pub translation: f64,
    pub scale: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but couldn't be read.
    #[error("Failed to read settings file '{path}'.")]
    FailedToRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file isn't valid settings JSON.
    #[error("Failed to parse settings file '{path}'.")]
    FailedToParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value parsed but makes no sense.
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl Default for HandTrackingSettings {
    fn default() -> Self {
        Self {
            max_hands: 1,
            detection_confidence: 0.7,
            tracking_confidence: 0.5,
        }
    }
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            rotation_multiplier: 0.5,
            translation_multiplier: 3.0,
            zoom_multiplier: 1.5,
            pinch_threshold: 0.05,
            smoothing: SmoothingSettings::default(),
        }
    }
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            rotation: 0.1,
            translation: 0.1,
            scale: 0.05,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8765,
        }
    }
}

impl CameraSettings {
    /// Time between two broadcast ticks.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1f64 / self.fps.max(1) as f64)
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file falls back to the
    /// defaults; any other failure is returned.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Settings file '{}' not found. Using defaults.",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::FailedToRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_str(&text).map_err(|source| ConfigError::FailedToParse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;

        info!("Loaded settings from '{}'.", path.display());
        Ok(settings)
    }

    /// Reject values the rest of the system can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.fps == 0 || self.camera.fps > MAX_FPS {
            return Err(invalid("camera.fps", "must be between 1 and 1000"));
        }
        if self.hand_tracking.max_hands == 0 {
            return Err(invalid("hand_tracking.max_hands", "must be at least 1"));
        }
        check_unit_interval(
            "hand_tracking.detection_confidence",
            self.hand_tracking.detection_confidence as f64,
        )?;
        check_unit_interval(
            "hand_tracking.tracking_confidence",
            self.hand_tracking.tracking_confidence as f64,
        )?;

        let sensitivity = &self.gesture_sensitivity;
        check_finite(
            "gesture_sensitivity.rotation_multiplier",
            sensitivity.rotation_multiplier,
        )?;
        check_finite(
            "gesture_sensitivity.translation_multiplier",
            sensitivity.translation_multiplier,
        )?;
        check_finite(
            "gesture_sensitivity.zoom_multiplier",
            sensitivity.zoom_multiplier,
        )?;
        if !(sensitivity.pinch_threshold.is_finite() && sensitivity.pinch_threshold > 0f64) {
            return Err(invalid(
                "gesture_sensitivity.pinch_threshold",
                "must be a positive number",
            ));
        }
        check_unit_interval(
            "gesture_sensitivity.smoothing.rotation",
            sensitivity.smoothing.rotation,
        )?;
        check_unit_interval(
            "gesture_sensitivity.smoothing.translation",
            sensitivity.smoothing.translation,
        )?;
        check_unit_interval(
            "gesture_sensitivity.smoothing.scale",
            sensitivity.smoothing.scale,
        )?;

        if self.transport.host.trim().is_empty() {
            return Err(invalid("transport.host", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "must be a finite number"))
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0f64..=1f64).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be between 0 and 1"))
    }
}
