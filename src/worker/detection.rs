//! Chessboard detection on a single image
//!
//! Steps: load, convert to grayscale, find the corner grid, report the
//! outcome, then refine the corners and draw them on a copy of the image.
//! The outcome is reported before any refinement or drawing happens.

use cgmath::Point2;
use image::{imageops, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{EventSink, RequestId, WorkerEvent};
use crate::error::VisionError;
use crate::state::data::ChessboardSpec;
use crate::vision::annotate::draw_corners;
use crate::vision::thumbnail::make_thumbnail;
use crate::vision::{TermCriteria, Vision, REFINE_WINDOW};

/// A preview detection requested by the coordinator
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub request: RequestId,
    pub filename: String,
    pub path: PathBuf,
    /// Copy of the board spec at dispatch time
    pub board: ChessboardSpec,
    /// Bounding box for the preview thumbnails
    pub thumbnail_size: (u32, u32),
}

/// Everything one detection pass learned about an image
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub filename: String,
    pub found: bool,
    /// Copy of the image with corner markers, when found and requested
    pub annotated_image: Option<RgbImage>,
    /// Refined corners, row-major, when found
    pub corner_points: Option<Vec<Point2<f32>>>,
    /// Size of the analysed image
    pub image_size: (u32, u32),
}

impl DetectionResult {
    fn not_found(filename: &str, image_size: (u32, u32)) -> Self {
        Self {
            filename: filename.to_string(),
            found: false,
            annotated_image: None,
            corner_points: None,
            image_size,
        }
    }
}

/// Decode an image file to RGB
pub fn load_image(path: &Path) -> Result<RgbImage, VisionError> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|source| VisionError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Run detection on a decoded image.
///
/// `report` is called exactly once with the found flag, before refinement
/// and annotation. Collaborator failures count as "not found".
pub fn detect_chessboard(
    board: &ChessboardSpec,
    filename: &str,
    image: &RgbImage,
    vision: &Vision,
    annotate: bool,
    report: impl FnOnce(bool),
) -> DetectionResult {
    let gray = imageops::grayscale(image);
    let pattern = board.pattern_size();

    let corners = match vision.finder.find_corners(&gray, pattern) {
        Ok(Some(corners)) if corners.len() == board.corner_count() => Some(corners),
        Ok(Some(corners)) => {
            log::warn!(
                "{}: finder returned {} corners, expected {}",
                filename,
                corners.len(),
                board.corner_count()
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("{}: {}", filename, e);
            None
        }
    };

    report(corners.is_some());

    let Some(corners) = corners else {
        log::debug!("{}: no chessboard", filename);
        return DetectionResult::not_found(filename, image.dimensions());
    };

    let refined = match vision.refiner.refine_corners(
        &gray,
        corners.clone(),
        REFINE_WINDOW,
        TermCriteria::default(),
    ) {
        Ok(refined) if refined.len() == corners.len() => refined,
        Ok(_) => {
            log::warn!("{}: refiner changed the corner count, keeping coarse corners", filename);
            corners
        }
        Err(e) => {
            log::warn!("{}: refinement failed, keeping coarse corners: {}", filename, e);
            corners
        }
    };

    let annotated_image = annotate.then(|| {
        let mut annotated = image.clone();
        draw_corners(&mut annotated, pattern, &refined);
        annotated
    });

    log::debug!("{}: chessboard found", filename);
    DetectionResult {
        filename: filename.to_string(),
        found: true,
        annotated_image,
        corner_points: Some(refined),
        image_size: image.dimensions(),
    }
}

/// Preview detection: raw thumbnail, outcome, annotated thumbnail, in that
/// order. An unreadable file only produces a negative outcome.
///
/// `outcome_posted` is set once the outcome event is on the channel.
pub fn run_detection(
    job: &DetectionJob,
    vision: &Vision,
    sink: &EventSink,
    outcome_posted: &AtomicBool,
) -> DetectionResult {
    let post_outcome = |found: bool| {
        sink.post(WorkerEvent::DetectionOutcome {
            filename: job.filename.clone(),
            found,
        });
        outcome_posted.store(true, Ordering::SeqCst);
    };

    let image = match load_image(&job.path) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Treating unreadable image as no chessboard: {}", e);
            post_outcome(false);
            return DetectionResult::not_found(&job.filename, (0, 0));
        }
    };

    let raw = make_thumbnail(&image, job.thumbnail_size);
    sink.post(WorkerEvent::RawThumbnail {
        request: job.request,
        filename: job.filename.clone(),
        image: raw.clone(),
    });

    let result = detect_chessboard(&job.board, &job.filename, &image, vision, true, post_outcome);

    let annotated = match &result.annotated_image {
        Some(annotated) => make_thumbnail(annotated, job.thumbnail_size),
        None => raw,
    };
    sink.post(WorkerEvent::AnnotatedThumbnail {
        request: job.request,
        filename: job.filename.clone(),
        image: annotated,
    });

    result
}
