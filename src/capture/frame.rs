use image::RgbImage;
use std::collections::VecDeque;
use std::time::Instant;

/// One decoded camera frame
///
/// Frames are immutable once captured; the acquisition thread publishes them
/// behind an `Arc` and readers share that allocation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Monotonic capture time
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Sliding-window rate meter
///
/// Keeps the timestamps of the last `window` intervals and reports
/// `intervals / (newest - oldest)`.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: usize,
    stamps: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            stamps: VecDeque::with_capacity(window + 1),
        }
    }

    /// Record one event at `now`
    pub fn tick(&mut self, now: Instant) {
        if self.stamps.len() == self.window + 1 {
            self.stamps.pop_front();
        }
        self.stamps.push_back(now);
    }

    /// Smoothed rate in events per second, 0 until two events are known
    pub fn fps(&self) -> f64 {
        let (Some(oldest), Some(newest)) = (self.stamps.front(), self.stamps.back()) else {
            return 0.0;
        };

        let span = newest.saturating_duration_since(*oldest).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }
        (self.stamps.len() - 1) as f64 / span
    }

    pub fn reset(&mut self) {
        self.stamps.clear();
    }
}
