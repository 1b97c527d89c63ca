//! Live camera acquisition
//!
//! This module handles:
//! - The frame type and the FPS meter (frame.rs)
//! - The camera seam the acquisition thread pulls from (device.rs)
//! - The continuously running frame source (source.rs)

pub mod device;
pub mod frame;
pub mod source;

pub use device::CaptureDevice;
pub use frame::{FpsCounter, Frame};
pub use source::FrameSource;
