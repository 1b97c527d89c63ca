//! Application configuration
//!
//! Stored as JSON. The file is looked up at `$CALIB_CAPTURE_CONFIG`, or in the
//! user's config directory:
//! - Linux: ~/.config/calib-capture/config.json
//! - macOS: ~/Library/Application Support/calib-capture/config.json
//! - Windows: %APPDATA%\calib-capture\config.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::state::data::ChessboardSpec;
use crate::state::input::DisplayScale;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "CALIB_CAPTURE_CONFIG";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the calibration images; its contents define the dataset
    pub image_dir: PathBuf,
    /// Where the camera matrix and distortion coefficients are written
    pub coefficients_path: PathBuf,
    /// OpenCV device index of the camera
    pub camera_index: i32,
    /// Bounding box (width, height) of the preview thumbnails
    pub thumbnail_size: (u32, u32),
    /// Board geometry the inputs start with
    pub default_chessboard: ChessboardSpec,
    /// Initial scaling of the live view
    pub display_scale: DisplayScale,
    /// Number of frame intervals averaged by the FPS counters
    pub fps_window: usize,
    /// Poll period of the coordinator loop in the desktop app
    pub tick_interval_ms: u64,
    /// Threads of the runtime hosting background workers
    pub worker_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("./calibration_images"),
            coefficients_path: PathBuf::from("./camera.json"),
            camera_index: 0,
            thumbnail_size: (400, 300),
            default_chessboard: ChessboardSpec::default(),
            display_scale: DisplayScale::Fit(720),
            fps_window: 10,
            tick_interval_ms: 15,
            worker_threads: 2,
        }
    }
}

impl AppConfig {
    /// Path the config is read from and saved to
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("calib-capture");
        path.push("config.json");
        Some(path)
    }

    /// Load the config from its default location, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the config from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }
}
