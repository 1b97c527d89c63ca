use image::RgbImage;

use crate::error::CaptureError;

/// A camera the acquisition thread can pull frames from
///
/// `grab` may block until the next frame is ready; it runs on the
/// acquisition thread only. `Ok(None)` means no frame this time (the device is
/// still healthy); an error means the device is gone.
pub trait CaptureDevice: Send {
    fn grab(&mut self) -> Result<Option<RgbImage>, CaptureError>;

    /// Human-readable device name for logs
    fn name(&self) -> String;
}
