//! Image-processing collaborators
//!
//! The corner finder, the sub-pixel refiner, the calibration solver and the
//! coefficient store are black boxes behind the traits below. Workers only
//! see them through a [`Vision`] bundle, so tests can swap in doubles.
//!
//! Architecture:
//! - `annotate.rs` - marker overlay for detected corners
//! - `thumbnail.rs` - preview resizing
//! - `coefficients.rs` - JSON persistence of calibration results
//! - `opencv.rs` - OpenCV implementations (feature `opencv`)

pub mod annotate;
pub mod coefficients;
pub mod thumbnail;

#[cfg(feature = "opencv")]
pub mod opencv;

use cgmath::{Matrix3, Point2, Point3, Vector3};
use image::GrayImage;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{PersistError, VisionError};

pub use coefficients::{CameraCoefficients, JsonCoefficientStore};

/// Search window for sub-pixel refinement, in pixels
pub const REFINE_WINDOW: (u32, u32) = (11, 11);

/// Stopping rule for iterative refinement: whichever comes first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermCriteria {
    pub max_iterations: u32,
    pub epsilon: f64,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            epsilon: 0.001,
        }
    }
}

/// Locates the interior corners of a chessboard
pub trait CornerFinder: Send + Sync {
    /// Returns the corners row by row when the full `pattern` grid is found,
    /// `None` when it is not.
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: (u32, u32),
    ) -> Result<Option<Vec<Point2<f32>>>, VisionError>;
}

/// Refines corner locations to sub-pixel precision
pub trait CornerRefiner: Send + Sync {
    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: Vec<Point2<f32>>,
        window: (u32, u32),
        criteria: TermCriteria,
    ) -> Result<Vec<Point2<f32>>, VisionError>;
}

/// Everything the solver reports for one calibration run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    /// RMS reprojection error in pixels
    pub rms: f64,
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
    /// Per-view rotation vectors (Rodrigues)
    pub rotations: Vec<Vector3<f64>>,
    /// Per-view translation vectors
    pub translations: Vec<Vector3<f64>>,
}

/// Closed-form camera calibration from board correspondences
pub trait CalibrationSolver: Send + Sync {
    /// `object_points[i]` and `image_points[i]` belong to the same view.
    /// Callers never pass an empty set of views.
    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: (u32, u32),
    ) -> Result<SolverOutput, VisionError>;
}

/// Durable storage for the computed coefficients
pub trait CoefficientStore: Send + Sync {
    /// Persist the coefficients and return where they went
    fn save(&self, coefficients: &CameraCoefficients) -> Result<PathBuf, PersistError>;
}

/// The collaborators one worker needs, cheap to clone into a task
#[derive(Clone)]
pub struct Vision {
    pub finder: Arc<dyn CornerFinder>,
    pub refiner: Arc<dyn CornerRefiner>,
    pub solver: Arc<dyn CalibrationSolver>,
    pub store: Arc<dyn CoefficientStore>,
}

impl std::fmt::Debug for Vision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vision").finish_non_exhaustive()
    }
}
