//! Deterministic collaborator doubles for unit tests
//!
//! The finder "sees" a board in any bright image (mean luma above half
//! scale) and answers with a regular grid, so tests pick the outcome by
//! writing a white or a black image.

use cgmath::{Matrix3, Point2, Point3, Vector3};
use image::{GrayImage, Rgb, RgbImage};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::capture::CaptureDevice;
use crate::error::{CaptureError, PersistError, VisionError};
use crate::state::data::ChessboardSpec;
use crate::vision::{
    CalibrationSolver, CameraCoefficients, CoefficientStore, CornerFinder, CornerRefiner,
    SolverOutput, TermCriteria, Vision,
};

pub const IMAGE_SIZE: (u32, u32) = (64, 48);
/// Position of the first grid corner, in pixels
pub const GRID_ORIGIN: f32 = 10.0;
pub const GRID_STEP: f32 = 10.0;
/// Offset the refiner adds to every coordinate
pub const REFINE_SHIFT: f32 = 0.25;

/// Small board so the doubles stay cheap
pub fn board() -> ChessboardSpec {
    ChessboardSpec {
        columns: 4,
        rows: 3,
        square_size_mm: 10.0,
    }
}

fn write_filled(dir: &Path, filename: &str, value: u8) -> PathBuf {
    let path = dir.join(filename);
    RgbImage::from_pixel(IMAGE_SIZE.0, IMAGE_SIZE.1, Rgb([value, value, value]))
        .save(&path)
        .unwrap();
    path
}

/// An image the finder double reports a board in
pub fn write_board_image(dir: &Path, filename: &str) -> PathBuf {
    write_filled(dir, filename, 255)
}

/// An image the finder double reports no board in
pub fn write_blank_image(dir: &Path, filename: &str) -> PathBuf {
    write_filled(dir, filename, 0)
}

/// A file no decoder accepts
pub fn write_garbage(dir: &Path, filename: &str) -> PathBuf {
    let path = dir.join(filename);
    std::fs::write(&path, b"definitely not an image").unwrap();
    path
}

struct GridFinder {
    calls: AtomicUsize,
    fixed_pattern: Option<(u32, u32)>,
    fail: bool,
}

impl CornerFinder for GridFinder {
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: (u32, u32),
    ) -> Result<Option<Vec<Point2<f32>>>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VisionError::Detector("finder double failure".into()));
        }

        let pixels = gray.as_raw();
        let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
        let mean = sum / (pixels.len().max(1) as u64);
        if mean <= 128 {
            return Ok(None);
        }

        let (columns, rows) = self.fixed_pattern.unwrap_or(pattern);
        let corners = (0..rows)
            .flat_map(|r| {
                (0..columns).map(move |c| {
                    Point2::new(
                        GRID_ORIGIN + c as f32 * GRID_STEP,
                        GRID_ORIGIN + r as f32 * GRID_STEP,
                    )
                })
            })
            .collect();
        Ok(Some(corners))
    }
}

struct ShiftRefiner {
    calls: AtomicUsize,
}

impl CornerRefiner for ShiftRefiner {
    fn refine_corners(
        &self,
        _gray: &GrayImage,
        corners: Vec<Point2<f32>>,
        _window: (u32, u32),
        _criteria: TermCriteria,
    ) -> Result<Vec<Point2<f32>>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(corners
            .into_iter()
            .map(|p| Point2::new(p.x + REFINE_SHIFT, p.y + REFINE_SHIFT))
            .collect())
    }
}

/// What one solver invocation received
#[derive(Debug, Clone, PartialEq)]
pub struct SolverCall {
    pub views: usize,
    pub points_per_view: usize,
    pub image_size: (u32, u32),
}

struct RecordingSolver {
    calls: Mutex<Vec<SolverCall>>,
    fail: bool,
}

impl CalibrationSolver for RecordingSolver {
    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: (u32, u32),
    ) -> Result<SolverOutput, VisionError> {
        assert_eq!(object_points.len(), image_points.len());
        assert!(!image_points.is_empty(), "solver called with no views");

        self.calls.lock().push(SolverCall {
            views: image_points.len(),
            points_per_view: image_points[0].len(),
            image_size,
        });
        if self.fail {
            return Err(VisionError::Solver("solver double failure".into()));
        }

        let views = image_points.len();
        Ok(SolverOutput {
            rms: 0.5,
            camera_matrix: Matrix3::new(500.0, 0.0, 0.0, 0.0, 500.0, 0.0, 32.0, 24.0, 1.0),
            distortion: vec![0.0; 5],
            rotations: vec![Vector3::new(0.0, 0.0, 0.0); views],
            translations: vec![Vector3::new(0.0, 0.0, 1.0); views],
        })
    }
}

struct RecordingStore {
    saved: Mutex<Vec<CameraCoefficients>>,
    fail: bool,
}

impl CoefficientStore for RecordingStore {
    fn save(&self, coefficients: &CameraCoefficients) -> Result<PathBuf, PersistError> {
        if self.fail {
            return Err(PersistError::Io {
                path: PathBuf::from("camera.json"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        self.saved.lock().push(coefficients.clone());
        Ok(PathBuf::from("camera.json"))
    }
}

/// A set of doubles plus handles to inspect what they were asked
pub struct Doubles {
    finder: Arc<GridFinder>,
    refiner: Arc<ShiftRefiner>,
    solver: Arc<RecordingSolver>,
    store: Arc<RecordingStore>,
}

impl Doubles {
    fn build(
        fixed_pattern: Option<(u32, u32)>,
        fail_finder: bool,
        fail_solver: bool,
        fail_store: bool,
    ) -> Self {
        Self {
            finder: Arc::new(GridFinder {
                calls: AtomicUsize::new(0),
                fixed_pattern,
                fail: fail_finder,
            }),
            refiner: Arc::new(ShiftRefiner {
                calls: AtomicUsize::new(0),
            }),
            solver: Arc::new(RecordingSolver {
                calls: Mutex::new(Vec::new()),
                fail: fail_solver,
            }),
            store: Arc::new(RecordingStore {
                saved: Mutex::new(Vec::new()),
                fail: fail_store,
            }),
        }
    }

    pub fn new() -> Self {
        Self::build(None, false, false, false)
    }

    /// Finder answers with this grid whatever it is asked for
    pub fn with_fixed_pattern(pattern: (u32, u32)) -> Self {
        Self::build(Some(pattern), false, false, false)
    }

    pub fn failing_finder() -> Self {
        Self::build(None, true, false, false)
    }

    pub fn failing_solver() -> Self {
        Self::build(None, false, true, false)
    }

    pub fn failing_store() -> Self {
        Self::build(None, false, false, true)
    }

    pub fn vision(&self) -> Vision {
        Vision {
            finder: self.finder.clone(),
            refiner: self.refiner.clone(),
            solver: self.solver.clone(),
            store: self.store.clone(),
        }
    }

    pub fn find_calls(&self) -> usize {
        self.finder.calls.load(Ordering::SeqCst)
    }

    pub fn refine_calls(&self) -> usize {
        self.refiner.calls.load(Ordering::SeqCst)
    }

    pub fn solver_calls(&self) -> Vec<SolverCall> {
        self.solver.calls.lock().clone()
    }

    pub fn saved(&self) -> Vec<CameraCoefficients> {
        self.store.saved.lock().clone()
    }
}

/// Camera that keeps delivering the same bright frame
pub struct StillCamera;

impl CaptureDevice for StillCamera {
    fn grab(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        std::thread::sleep(std::time::Duration::from_millis(2));
        Ok(Some(RgbImage::from_pixel(
            IMAGE_SIZE.0,
            IMAGE_SIZE.1,
            Rgb([255, 255, 255]),
        )))
    }

    fn name(&self) -> String {
        "still".into()
    }
}
