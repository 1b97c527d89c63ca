//! OpenCV-backed collaborators
//!
//! Camera access through `VideoCapture`, corners through
//! `findChessboardCorners` + `cornerSubPix`, and the solver through
//! `calibrateCamera`. Images cross the boundary as tightly packed buffers.

use cgmath::{Matrix3, Point2, Point3, Vector3};
use image::{GrayImage, RgbImage};
use opencv::core::{self, Mat, Point2f, Point3f, Size, Vector};
use opencv::prelude::*;
use opencv::{calib3d, imgproc, videoio};
use std::sync::Arc;

use super::{
    CalibrationSolver, CoefficientStore, CornerFinder, CornerRefiner, SolverOutput, TermCriteria,
    Vision,
};
use crate::capture::CaptureDevice;
use crate::error::{CaptureError, VisionError};

/// Consecutive empty reads before the camera counts as disconnected
const MAX_EMPTY_READS: u32 = 30;

/// A camera opened through OpenCV's `VideoCapture`
pub struct OpenCvCamera {
    capture: videoio::VideoCapture,
    index: i32,
    frame: Mat,
    empty_reads: u32,
}

impl OpenCvCamera {
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", index, e)))?;

        let opened = capture
            .is_opened()
            .map_err(|e| CaptureError::Unavailable(format!("{}: {}", index, e)))?;
        if !opened {
            return Err(CaptureError::Unavailable(index.to_string()));
        }

        Ok(Self {
            capture,
            index,
            frame: Mat::default(),
            empty_reads: 0,
        })
    }
}

impl CaptureDevice for OpenCvCamera {
    fn grab(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let read = self
            .capture
            .read(&mut self.frame)
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        if !read || self.frame.empty() {
            self.empty_reads += 1;
            if self.empty_reads > MAX_EMPTY_READS {
                return Err(CaptureError::Read(format!(
                    "{} empty reads in a row",
                    self.empty_reads
                )));
            }
            return Ok(None);
        }
        self.empty_reads = 0;

        bgr_to_rgb_image(&self.frame)
            .map(Some)
            .map_err(|e| CaptureError::Read(e.to_string()))
    }

    fn name(&self) -> String {
        format!("#{}", self.index)
    }
}

fn bgr_to_rgb_image(bgr: &Mat) -> opencv::Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let bytes = rgb.data_bytes()?.to_vec();

    RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
        opencv::Error::new(core::StsBadSize, "frame buffer size mismatch".to_string())
    })
}

fn gray_to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
    let (width, height) = gray.dimensions();
    Mat::new_rows_cols_with_data(height as i32, width as i32, gray.as_raw())?.try_clone()
}

fn detector_err(e: opencv::Error) -> VisionError {
    VisionError::Detector(e.to_string())
}

fn solver_err(e: opencv::Error) -> VisionError {
    VisionError::Solver(e.to_string())
}

/// `findChessboardCorners` and `cornerSubPix`
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvChessboard;

impl CornerFinder for OpenCvChessboard {
    fn find_corners(
        &self,
        gray: &GrayImage,
        pattern: (u32, u32),
    ) -> Result<Option<Vec<Point2<f32>>>, VisionError> {
        let mat = gray_to_mat(gray).map_err(detector_err)?;
        let size = Size::new(pattern.0 as i32, pattern.1 as i32);
        let mut corners: Vector<Point2f> = Vector::new();

        let found = calib3d::find_chessboard_corners_def(&mat, size, &mut corners)
            .map_err(detector_err)?;
        if !found {
            return Ok(None);
        }

        Ok(Some(corners.iter().map(|p| Point2::new(p.x, p.y)).collect()))
    }
}

impl CornerRefiner for OpenCvChessboard {
    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: Vec<Point2<f32>>,
        window: (u32, u32),
        criteria: TermCriteria,
    ) -> Result<Vec<Point2<f32>>, VisionError> {
        let mat = gray_to_mat(gray).map_err(detector_err)?;
        let mut points: Vector<Point2f> =
            corners.iter().map(|p| Point2f::new(p.x, p.y)).collect();

        let term = core::TermCriteria::new(
            core::TermCriteria_Type::COUNT as i32 + core::TermCriteria_Type::EPS as i32,
            criteria.max_iterations as i32,
            criteria.epsilon,
        )
        .map_err(detector_err)?;

        imgproc::corner_sub_pix(
            &mat,
            &mut points,
            Size::new(window.0 as i32, window.1 as i32),
            Size::new(-1, -1),
            term,
        )
        .map_err(detector_err)?;

        Ok(points.iter().map(|p| Point2::new(p.x, p.y)).collect())
    }
}

/// `calibrateCamera`
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvSolver;

impl CalibrationSolver for OpenCvSolver {
    fn calibrate(
        &self,
        object_points: &[Vec<Point3<f32>>],
        image_points: &[Vec<Point2<f32>>],
        image_size: (u32, u32),
    ) -> Result<SolverOutput, VisionError> {
        let objects: Vector<Vector<Point3f>> = object_points
            .iter()
            .map(|view| view.iter().map(|p| Point3f::new(p.x, p.y, p.z)).collect())
            .collect();
        let images: Vector<Vector<Point2f>> = image_points
            .iter()
            .map(|view| view.iter().map(|p| Point2f::new(p.x, p.y)).collect())
            .collect();

        let mut camera_matrix = Mat::default();
        let mut dist_coeffs = Mat::default();
        let mut rvecs: Vector<Mat> = Vector::new();
        let mut tvecs: Vector<Mat> = Vector::new();

        let rms = calib3d::calibrate_camera_def(
            &objects,
            &images,
            Size::new(image_size.0 as i32, image_size.1 as i32),
            &mut camera_matrix,
            &mut dist_coeffs,
            &mut rvecs,
            &mut tvecs,
        )
        .map_err(solver_err)?;

        let k = |r: i32, c: i32| -> Result<f64, VisionError> {
            camera_matrix.at_2d::<f64>(r, c).copied().map_err(solver_err)
        };
        // Matrix3::new takes columns
        #[rustfmt::skip]
        let camera = Matrix3::new(
            k(0, 0)?, k(1, 0)?, k(2, 0)?,
            k(0, 1)?, k(1, 1)?, k(2, 1)?,
            k(0, 2)?, k(1, 2)?, k(2, 2)?,
        );

        let distortion = dist_coeffs.data_typed::<f64>().map_err(solver_err)?.to_vec();

        let to_vectors = |mats: &Vector<Mat>| -> Result<Vec<Vector3<f64>>, VisionError> {
            mats.iter()
                .map(|m| {
                    let v = m.data_typed::<f64>().map_err(solver_err)?;
                    match v {
                        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
                        _ => Err(VisionError::Solver("pose vector is not 3x1".into())),
                    }
                })
                .collect()
        };

        Ok(SolverOutput {
            rms,
            camera_matrix: camera,
            distortion,
            rotations: to_vectors(&rvecs)?,
            translations: to_vectors(&tvecs)?,
        })
    }
}

/// Collaborator bundle backed by OpenCV, persisting through `store`
pub fn vision(store: Arc<dyn CoefficientStore>) -> Vision {
    let chessboard = Arc::new(OpenCvChessboard);
    Vision {
        finder: chessboard.clone(),
        refiner: chessboard,
        solver: Arc::new(OpenCvSolver),
        store,
    }
}

/// Open the configured camera, for use as a `FrameSource` opener
pub fn camera_opener(index: i32) -> impl FnOnce() -> Result<OpenCvCamera, CaptureError> + Send {
    move || OpenCvCamera::open(index)
}
