//! Interactive checkerboard capture and camera calibration
//!
//! A live camera feed runs on its own thread, corner detection and
//! calibration run as one-shot background workers, and a single
//! [`app::Coordinator`] owns the dataset and everything the UI shows.
//!
//! Architecture:
//! - `state/` - image records, the dataset, board inputs
//! - `capture/` - camera seam and the latest-frame source
//! - `vision/` - detector/solver/store seams, overlays, thumbnails
//! - `worker/` - detection and calibration workers, event channel
//! - `app/` - the coordinating event loop
//! - `ui/` - iced front-end (feature `gui`)

pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod vision;
pub mod worker;

#[cfg(feature = "gui")]
pub mod ui;

#[cfg(test)]
mod testing;
