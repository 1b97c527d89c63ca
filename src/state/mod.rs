//! State management module
//!
//! This module holds everything the coordinator owns:
//! - Shared data structures (data.rs)
//! - The calibration image registry (dataset.rs)
//! - Input validation for the board geometry fields (input.rs)

pub mod data;
pub mod dataset;
pub mod input;
