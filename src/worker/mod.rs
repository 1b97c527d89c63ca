//! Background workers
//!
//! Detection and calibration run as one-shot blocking tasks on a runtime the
//! coordinator owns. A worker never touches coordinator state: its only
//! output is the [`WorkerEvent`]s it posts, in order, on one shared channel.

pub mod calibration;
pub mod detection;

use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::vision::Vision;
use calibration::{CalibrationJob, CalibrationResult};
use detection::DetectionJob;

/// Identifies one preview detection dispatched by the coordinator
pub type RequestId = u64;

/// Messages from workers to the coordinator
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Outcome of one detection pass; always posted before that pass's
    /// annotated thumbnail
    DetectionOutcome { filename: String, found: bool },
    /// Unmarked preview of the image being detected
    RawThumbnail {
        request: RequestId,
        filename: String,
        image: RgbImage,
    },
    /// Preview with corner markers (unmarked when no board was found)
    AnnotatedThumbnail {
        request: RequestId,
        filename: String,
        image: RgbImage,
    },
    /// `processed` of `total` images have been through detection
    CalibrationProgress { processed: usize, total: usize },
    /// Terminal event of a calibration run
    CalibrationFinished(CalibrationResult),
}

/// Sending half of the worker channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<WorkerEvent>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<WorkerEvent>) -> Self {
        Self { tx }
    }

    /// Post an event. After the coordinator has shut down this is a no-op.
    pub fn post(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Coordinator gone, dropping worker event");
        }
    }
}

/// Create a connected sink and receiver
pub fn channel() -> (EventSink, UnboundedReceiver<WorkerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink::new(tx), rx)
}

/// Runs workers detached from the coordinator
///
/// Tasks are fire-and-forget; nothing ever joins them from the coordinator.
/// A panicking worker still produces a terminal event for its operation.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    sink: EventSink,
}

impl WorkerPool {
    /// Start the worker runtime. Events arrive on the returned receiver.
    pub fn new(threads: usize) -> std::io::Result<(Self, UnboundedReceiver<WorkerEvent>)> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name("calib-worker")
            .build()?;
        let (sink, rx) = channel();

        Ok((
            Self {
                runtime: Some(runtime),
                sink,
            },
            rx,
        ))
    }

    /// Detect the board in one image, posting outcome and thumbnails
    pub fn spawn_detection(&self, job: DetectionJob, vision: Vision) {
        let Some(runtime) = &self.runtime else {
            log::warn!("Worker pool stopped, not detecting {}", job.filename);
            return;
        };

        let filename = job.filename.clone();
        let outcome_posted = Arc::new(AtomicBool::new(false));
        let sink = self.sink.clone();
        let posted = outcome_posted.clone();
        let task = runtime.spawn_blocking(move || {
            detection::run_detection(&job, &vision, &sink, &posted);
        });

        let sink = self.sink.clone();
        runtime.spawn(async move {
            if let Err(e) = task.await {
                log::error!("Detection worker for {} failed: {}", filename, e);
                // A failure after the outcome went out leaves that outcome in place
                if !outcome_posted.load(Ordering::SeqCst) {
                    sink.post(WorkerEvent::DetectionOutcome {
                        filename,
                        found: false,
                    });
                }
            }
        });
    }

    /// Run a full calibration over the job's snapshot of filenames
    pub fn spawn_calibration(&self, job: CalibrationJob, vision: Vision) {
        let Some(runtime) = &self.runtime else {
            log::warn!("Worker pool stopped, not calibrating");
            self.sink
                .post(WorkerEvent::CalibrationFinished(CalibrationResult::failure(
                    "Calibration could not be started",
                )));
            return;
        };

        let sink = self.sink.clone();
        let task = runtime.spawn_blocking(move || {
            let result = calibration::run_calibration(&job, &vision, &sink);
            sink.post(WorkerEvent::CalibrationFinished(result));
        });

        let sink = self.sink.clone();
        runtime.spawn(async move {
            if let Err(e) = task.await {
                log::error!("Calibration worker failed: {}", e);
                sink.post(WorkerEvent::CalibrationFinished(CalibrationResult::failure(
                    format!("Calibration failed: {}", e),
                )));
            }
        });
    }

    /// Stop accepting work. Running workers finish in the background.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            log::debug!("Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
