//! Calibration coefficient persistence
//!
//! Results are written as pretty-printed JSON to a fixed path, replacing any
//! earlier calibration.

use cgmath::Matrix3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::CoefficientStore;
use crate::error::PersistError;

/// Intrinsics produced by a successful calibration
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCoefficients {
    pub camera_matrix: Matrix3<f64>,
    /// (k1, k2, p1, p2, k3, ...)
    pub distortion: Vec<f64>,
    /// RMS reprojection error in pixels
    pub rms: f64,
    pub image_size: (u32, u32),
    /// Number of views the solver used
    pub views: usize,
}

/// On-disk layout of the coefficient file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoefficientFile {
    /// Row-major 3x3 camera matrix
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion_coefficients: Vec<f64>,
    pub rms_reprojection_error: f64,
    pub image_size: (u32, u32),
    pub views: usize,
    /// RFC 3339 timestamp of the calibration
    pub saved_at: String,
}

impl CoefficientFile {
    pub fn from_coefficients(coefficients: &CameraCoefficients) -> Self {
        // cgmath matrices are column-major
        let m = &coefficients.camera_matrix;
        let camera_matrix = [
            [m.x.x, m.y.x, m.z.x],
            [m.x.y, m.y.y, m.z.y],
            [m.x.z, m.y.z, m.z.z],
        ];

        Self {
            camera_matrix,
            distortion_coefficients: coefficients.distortion.clone(),
            rms_reprojection_error: coefficients.rms,
            image_size: coefficients.image_size,
            views: coefficients.views,
            saved_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Camera matrix back in cgmath form
    #[rustfmt::skip]
    pub fn camera_matrix(&self) -> Matrix3<f64> {
        let r = &self.camera_matrix;
        Matrix3::new(
            r[0][0], r[1][0], r[2][0],
            r[0][1], r[1][1], r[2][1],
            r[0][2], r[1][2], r[2][2],
        )
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let text = fs::read_to_string(path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Writes coefficients to one well-known JSON file
#[derive(Debug, Clone)]
pub struct JsonCoefficientStore {
    path: PathBuf,
}

impl JsonCoefficientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoefficientStore for JsonCoefficientStore {
    fn save(&self, coefficients: &CameraCoefficients) -> Result<PathBuf, PersistError> {
        let io_err = |source: std::io::Error| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&CoefficientFile::from_coefficients(coefficients))?;
        fs::write(&self.path, json).map_err(io_err)?;

        log::info!("Coefficients saved to {}", self.path.display());
        Ok(self.path.clone())
    }
}
