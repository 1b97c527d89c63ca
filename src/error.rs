//! Error types for the capture tool.
//!
//! Each failure domain gets its own enum. Image-local failures never leave the
//! worker that hit them; they are turned into a negative detection instead.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while keeping the dataset in sync with the image directory
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no calibration image named {0}")]
    UnknownRecord(String),
}

/// Camera acquisition failures
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera {0} could not be opened")]
    Unavailable(String),

    #[error("camera read failed: {0}")]
    Read(String),

    #[error("failed to write capture {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create image directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the image-processing collaborators
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("corner detection failed: {0}")]
    Detector(String),

    #[error("calibration solver failed: {0}")]
    Solver(String),
}

/// Failures while writing calibration coefficients
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize coefficients: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures while loading or saving the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures that stop the coordinator from starting
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
