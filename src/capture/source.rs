use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::device::CaptureDevice;
use super::frame::{FpsCounter, Frame};
use crate::error::CaptureError;

/// Back-off when the device reports no frame without failing
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// State shared between the acquisition thread and readers
struct Shared {
    /// Last published frame; replaced wholesale, never mutated in place
    latest: Mutex<Option<Arc<Frame>>>,
    fps: Mutex<FpsCounter>,
    available: AtomicBool,
    running: AtomicBool,
}

/// Continuously acquires frames from a camera on a dedicated thread.
///
/// Readers get the most recent frame without blocking on the device. If the
/// camera cannot be opened, or disappears, the source stays unavailable and
/// `read` keeps returning `None`.
pub struct FrameSource {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Start acquisition. `opener` runs on the acquisition thread.
    pub fn start<D, F>(opener: F, fps_window: usize) -> Self
    where
        D: CaptureDevice + 'static,
        F: FnOnce() -> Result<D, CaptureError> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            latest: Mutex::new(None),
            fps: Mutex::new(FpsCounter::new(fps_window)),
            available: AtomicBool::new(false),
            running: AtomicBool::new(true),
        });

        let thread_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("frame-source".into())
            .spawn(move || match opener() {
                Ok(device) => {
                    log::info!("Camera {} opened", device.name());
                    thread_shared.available.store(true, Ordering::Release);
                    acquire(device, &thread_shared);
                }
                Err(e) => {
                    log::error!("Camera not available: {}", e);
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start acquisition thread: {}", e);
                shared.running.store(false, Ordering::Release);
                None
            }
        };

        Self { shared, handle }
    }

    /// Most recent frame, or `None` while no frame has been produced or the
    /// camera is unavailable
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.shared.latest.lock().clone()
    }

    /// Whether the camera is open and delivering frames
    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::Acquire)
    }

    /// Smoothed acquisition rate
    pub fn current_fps(&self) -> f64 {
        self.shared.fps.lock().fps()
    }

    /// Stop acquisition and release the camera. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Acquisition thread panicked");
            }
            log::info!("Camera released");
        }

        self.shared.available.store(false, Ordering::Release);
        *self.shared.latest.lock() = None;
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("available", &self.is_available())
            .field("fps", &self.current_fps())
            .finish()
    }
}

/// Acquisition loop; the device is dropped (released) when it returns
fn acquire<D: CaptureDevice>(mut device: D, shared: &Shared) {
    while shared.running.load(Ordering::Acquire) {
        match device.grab() {
            Ok(Some(image)) => {
                let now = Instant::now();
                // Build the frame first, then publish it in one swap
                let frame = Arc::new(Frame::new(image, now));
                *shared.latest.lock() = Some(frame);
                shared.fps.lock().tick(now);
            }
            Ok(None) => thread::sleep(IDLE_BACKOFF),
            Err(e) => {
                log::error!("Camera {} lost: {}", device.name(), e);
                shared.available.store(false, Ordering::Release);
                *shared.latest.lock() = None;
                break;
            }
        }
    }
}
