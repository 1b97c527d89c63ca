//! Full calibration over a snapshot of the dataset
//!
//! Every image is detected again with the frozen board spec, since earlier
//! detection states may belong to a different board. Images without a board
//! are skipped; the solver only ever sees at least one view.

use cgmath::{Point2, Point3};
use std::path::PathBuf;

use super::detection::{detect_chessboard, load_image};
use super::{EventSink, WorkerEvent};
use crate::state::data::ChessboardSpec;
use crate::vision::{CameraCoefficients, Vision};

/// Terminal message when no image contained a board
pub const NO_BOARDS_MESSAGE: &str = "No chessboard images found";

/// Input of one calibration run, copied out of the coordinator at dispatch
#[derive(Debug, Clone)]
pub struct CalibrationJob {
    pub board: ChessboardSpec,
    pub directory: PathBuf,
    /// Snapshot of the dataset, in dataset order
    pub filenames: Vec<String>,
}

/// Terminal outcome of a calibration run
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub success: bool,
    /// Present only on success
    pub coefficients: Option<CameraCoefficients>,
    /// Human-readable summary for the user
    pub message: String,
}

impl CalibrationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            coefficients: None,
            message: message.into(),
        }
    }
}

/// Detect every image in the job, then solve and persist.
///
/// Posts a `DetectionOutcome` and a `CalibrationProgress` per image. The
/// terminal event is left to the caller.
pub fn run_calibration(
    job: &CalibrationJob,
    vision: &Vision,
    sink: &EventSink,
) -> CalibrationResult {
    let total = job.filenames.len();
    log::info!("🎯 Calibrating over {} images", total);

    let board_points = job.board.object_points();
    let mut object_points: Vec<Vec<Point3<f32>>> = Vec::new();
    let mut image_points: Vec<Vec<Point2<f32>>> = Vec::new();
    let mut image_size = None;

    for (index, filename) in job.filenames.iter().enumerate() {
        let report = |found: bool| {
            sink.post(WorkerEvent::DetectionOutcome {
                filename: filename.clone(),
                found,
            })
        };

        match load_image(&job.directory.join(filename)) {
            Ok(image) => {
                let result = detect_chessboard(&job.board, filename, &image, vision, false, report);
                if let Some(corners) = result.corner_points {
                    object_points.push(board_points.clone());
                    image_points.push(corners);
                    image_size = Some(result.image_size);
                }
            }
            Err(e) => {
                log::warn!("Skipping unreadable image: {}", e);
                report(false);
            }
        }

        sink.post(WorkerEvent::CalibrationProgress {
            processed: index + 1,
            total,
        });
    }

    let Some(image_size) = image_size else {
        log::warn!("{}", NO_BOARDS_MESSAGE);
        return CalibrationResult::failure(NO_BOARDS_MESSAGE);
    };

    let views = image_points.len();
    let output = match vision.solver.calibrate(&object_points, &image_points, image_size) {
        Ok(output) => output,
        Err(e) => {
            log::error!("Calibration failed: {}", e);
            return CalibrationResult::failure(format!("Calibration failed: {}", e));
        }
    };

    let coefficients = CameraCoefficients {
        camera_matrix: output.camera_matrix,
        distortion: output.distortion,
        rms: output.rms,
        image_size,
        views,
    };

    match vision.store.save(&coefficients) {
        Ok(path) => {
            log::info!(
                "✅ Calibrated from {} of {} images, RMS {:.4}",
                views,
                total,
                coefficients.rms
            );
            CalibrationResult {
                success: true,
                message: format!(
                    "Calibration complete: {} of {} images used, RMS error {:.4} px. Saved to {}",
                    views,
                    total,
                    coefficients.rms,
                    path.display()
                ),
                coefficients: Some(coefficients),
            }
        }
        Err(e) => {
            log::error!("Failed to save coefficients: {}", e);
            CalibrationResult::failure(format!("Calibration succeeded but saving failed: {}", e))
        }
    }
}
