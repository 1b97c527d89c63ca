//! The coordinating event loop
//!
//! [`Coordinator`] owns every piece of mutable state: the dataset, the
//! selection, the board spec and the view model. It is driven by `tick`,
//! which never blocks:
//! 1. apply every pending worker event, in arrival order
//! 2. take the latest camera frame, if there is a new one
//! 3. handle at most one queued user event
//!
//! Workers only ever talk back through the event channel, so nothing here
//! needs a lock.

use chrono::{DateTime, TimeZone};
use image::RgbImage;
use std::collections::VecDeque;
use std::fmt::Display;
use std::mem;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::capture::{FpsCounter, Frame, FrameSource};
use crate::config::AppConfig;
use crate::error::{AppError, CaptureError};
use crate::state::data::{CalibrationImageRecord, ChessboardSpec};
use crate::state::dataset::Dataset;
use crate::state::input::{edit_corner_count, edit_square_size, DisplayScale};
use crate::vision::thumbnail::scale_for_display;
use crate::vision::Vision;
use crate::worker::calibration::CalibrationJob;
use crate::worker::detection::DetectionJob;
use crate::worker::{RequestId, WorkerEvent, WorkerPool};

/// Interactions the front-end forwards to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// Row selection changed, by filename; `None` clears it
    Select(Option<String>),
    EditColumns(String),
    EditRows(String),
    EditSquareSize(String),
    /// Save the current camera frame into the image directory
    Capture,
    DeleteSelected,
    Calibrate,
    SetDisplayScale(DisplayScale),
    /// Reconcile the dataset with the image directory
    Rescan,
}

/// One-shot message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub success: bool,
    pub message: String,
}

/// Everything the front-end renders, kept current by the coordinator
#[derive(Debug, Clone)]
pub struct ViewState {
    pub rows: Vec<CalibrationImageRecord>,
    pub selected: Option<usize>,
    pub columns_text: String,
    pub rows_text: String,
    pub square_size_text: String,
    pub raw_thumbnail: Option<RgbImage>,
    pub annotated_thumbnail: Option<RgbImage>,
    /// Latest camera frame, already scaled for display
    pub live_frame: Option<RgbImage>,
    pub camera_available: bool,
    pub capture_fps: f64,
    pub process_fps: f64,
    pub display_scale: DisplayScale,
    /// (processed, total) while a calibration runs
    pub progress: Option<(usize, usize)>,
    pub calibrating: bool,
    pub can_delete: bool,
    /// Last status line
    pub status: String,
}

impl ViewState {
    fn new(board: &ChessboardSpec, display_scale: DisplayScale) -> Self {
        Self {
            rows: Vec::new(),
            selected: None,
            columns_text: board.columns.to_string(),
            rows_text: board.rows.to_string(),
            square_size_text: board.square_size_mm.to_string(),
            raw_thumbnail: None,
            annotated_thumbnail: None,
            live_frame: None,
            camera_available: false,
            capture_fps: 0.0,
            process_fps: 0.0,
            display_scale,
            progress: None,
            calibrating: false,
            can_delete: false,
            status: String::from("Ready"),
        }
    }
}

/// Name of a captured frame taken at `time`
pub fn capture_filename<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("{}.jpg", time.format("%Y%m%d_%H%M%S"))
}

pub struct Coordinator {
    config: AppConfig,
    vision: Vision,
    dataset: Dataset,
    chessboard: ChessboardSpec,
    /// Selection is tracked by name; the row index is derived on demand
    selected: Option<String>,
    /// Id of the most recent detection dispatch
    latest_request: RequestId,
    calibrating: bool,
    frames: Option<FrameSource>,
    last_frame: Option<Arc<Frame>>,
    process_fps: FpsCounter,
    pending: VecDeque<UserEvent>,
    pool: WorkerPool,
    events: UnboundedReceiver<WorkerEvent>,
    view: ViewState,
    notification: Option<Notification>,
}

impl Coordinator {
    /// Start the worker runtime and load the image directory.
    /// `frames` is `None` when running without a camera.
    pub fn new(
        config: AppConfig,
        vision: Vision,
        frames: Option<FrameSource>,
    ) -> Result<Self, AppError> {
        let (pool, events) = WorkerPool::new(config.worker_threads)?;
        let chessboard = config.default_chessboard;
        let view = ViewState::new(&chessboard, config.display_scale);
        let process_fps = FpsCounter::new(config.fps_window);

        let mut coordinator = Self {
            dataset: Dataset::new(config.image_dir.clone()),
            config,
            vision,
            chessboard,
            selected: None,
            latest_request: 0,
            calibrating: false,
            frames,
            last_frame: None,
            process_fps,
            pending: VecDeque::new(),
            pool,
            events,
            view,
            notification: None,
        };

        coordinator.reconcile();
        log::info!(
            "📷 Calibration session started with {} images in {}",
            coordinator.dataset.len(),
            coordinator.dataset.directory().display()
        );
        Ok(coordinator)
    }

    /// Queue a user event for a later tick. Board edits show up in their
    /// field immediately; the board itself changes when the tick runs.
    pub fn submit(&mut self, event: UserEvent) {
        self.echo_edit(&event);
        self.pending.push_back(event);
    }

    /// One non-blocking iteration of the loop
    pub fn tick(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply_worker_event(event);
        }

        self.poll_frame();

        if let Some(event) = self.pending.pop_front() {
            self.handle_user_event(event);
        }

        self.sync_view();
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Pending notification, handed out once
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn chessboard(&self) -> &ChessboardSpec {
        &self.chessboard
    }

    pub fn selected_filename(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
            .as_deref()
            .and_then(|filename| self.dataset.position(filename))
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Release the camera and stop accepting work. Running workers are not
    /// waited for.
    pub fn shutdown(&mut self) {
        if let Some(mut frames) = self.frames.take() {
            frames.stop();
        }
        self.last_frame = None;
        self.view.camera_available = false;
        self.pool.shutdown();
    }

    fn apply_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::DetectionOutcome { filename, found } => {
                self.dataset.apply_detection_result(&filename, found);
            }
            WorkerEvent::RawThumbnail {
                request,
                filename,
                image,
            } => {
                if self.is_current(request, &filename) {
                    self.view.raw_thumbnail = Some(image);
                } else {
                    log::debug!("Dropping stale thumbnail for {}", filename);
                }
            }
            WorkerEvent::AnnotatedThumbnail {
                request,
                filename,
                image,
            } => {
                if self.is_current(request, &filename) {
                    self.view.annotated_thumbnail = Some(image);
                } else {
                    log::debug!("Dropping stale annotated thumbnail for {}", filename);
                }
            }
            WorkerEvent::CalibrationProgress { processed, total } => {
                if self.calibrating {
                    self.view.progress = Some((processed, total));
                }
            }
            WorkerEvent::CalibrationFinished(result) => {
                self.calibrating = false;
                self.view.progress = None;
                self.notify(result.success, result.message);
            }
        }
    }

    /// Thumbnails are shown only for the selected file and the newest request
    fn is_current(&self, request: RequestId, filename: &str) -> bool {
        request == self.latest_request && self.selected.as_deref() == Some(filename)
    }

    fn poll_frame(&mut self) {
        let Some(frames) = &self.frames else {
            return;
        };

        self.view.camera_available = frames.is_available();
        self.view.capture_fps = frames.current_fps();

        let Some(frame) = frames.read() else {
            if !self.view.camera_available && self.last_frame.take().is_some() {
                self.view.live_frame = None;
                self.process_fps.reset();
                self.view.process_fps = 0.0;
            }
            return;
        };

        if let Some(last) = &self.last_frame {
            if Arc::ptr_eq(last, &frame) {
                return;
            }
        }

        self.view.live_frame = Some(scale_for_display(&frame.image, self.view.display_scale));
        self.process_fps.tick(Instant::now());
        self.view.process_fps = self.process_fps.fps();
        self.last_frame = Some(frame);
    }

    /// Keystrokes arriving between ticks build on the echoed text
    fn echo_edit(&mut self, event: &UserEvent) {
        if self.calibrating {
            return;
        }
        match event {
            UserEvent::EditColumns(text) => {
                self.view.columns_text = edit_corner_count(text, self.chessboard.columns).text;
            }
            UserEvent::EditRows(text) => {
                self.view.rows_text = edit_corner_count(text, self.chessboard.rows).text;
            }
            UserEvent::EditSquareSize(text) => {
                self.view.square_size_text =
                    edit_square_size(text, self.chessboard.square_size_mm).text;
            }
            _ => {}
        }
    }

    fn handle_user_event(&mut self, event: UserEvent) {
        // A newer edit of the same field is still queued; its echo stays
        let superseded = self
            .pending
            .iter()
            .any(|queued| mem::discriminant(queued) == mem::discriminant(&event));

        match event {
            // The row may have gone between the click and this tick
            UserEvent::Select(Some(filename)) if self.dataset.position(&filename).is_none() => {
                log::debug!("Ignoring selection of {}, no longer in the dataset", filename);
            }
            UserEvent::Select(filename) => self.select(filename),
            UserEvent::EditColumns(text) => {
                if self.inputs_locked() {
                    return;
                }
                let edit = edit_corner_count(&text, self.chessboard.columns);
                if !superseded {
                    self.view.columns_text = edit.text;
                }
                if let Some(columns) = edit.value {
                    self.chessboard.columns = columns;
                }
            }
            UserEvent::EditRows(text) => {
                if self.inputs_locked() {
                    return;
                }
                let edit = edit_corner_count(&text, self.chessboard.rows);
                if !superseded {
                    self.view.rows_text = edit.text;
                }
                if let Some(rows) = edit.value {
                    self.chessboard.rows = rows;
                }
            }
            UserEvent::EditSquareSize(text) => {
                if self.inputs_locked() {
                    return;
                }
                let edit = edit_square_size(&text, self.chessboard.square_size_mm);
                if !superseded {
                    self.view.square_size_text = edit.text;
                }
                if let Some(size) = edit.value {
                    self.chessboard.square_size_mm = size;
                }
            }
            UserEvent::Capture => self.capture(),
            UserEvent::DeleteSelected => self.delete_selected(),
            UserEvent::Calibrate => self.start_calibration(),
            UserEvent::SetDisplayScale(scale) => {
                self.view.display_scale = scale;
                // Rescale the current frame on the next poll
                self.last_frame = None;
            }
            UserEvent::Rescan => self.reconcile(),
        }
    }

    fn inputs_locked(&self) -> bool {
        if self.calibrating {
            log::debug!("Board spec is frozen while calibrating");
        }
        self.calibrating
    }

    /// Change the selection and start detection on the new file
    fn select(&mut self, filename: Option<String>) {
        self.clear_selection();

        if let Some(filename) = filename {
            self.selected = Some(filename.clone());
            self.dispatch_detection(filename);
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.view.raw_thumbnail = None;
        self.view.annotated_thumbnail = None;
        // Anything already in flight is now stale
        self.latest_request += 1;
    }

    fn dispatch_detection(&mut self, filename: String) {
        self.latest_request += 1;
        let job = DetectionJob {
            request: self.latest_request,
            path: self.dataset.directory().join(&filename),
            filename,
            board: self.chessboard,
            thumbnail_size: self.config.thumbnail_size,
        };
        log::debug!("Detecting {} (request {})", job.filename, job.request);
        self.pool.spawn_detection(job, self.vision.clone());
    }

    /// Bring the dataset in line with the directory; a selected file that
    /// vanished loses the selection
    fn reconcile(&mut self) {
        let report = self.dataset.rescan();
        if report.added > 0 || report.removed > 0 {
            log::info!(
                "📁 Dataset: {} added, {} removed, {} images",
                report.added,
                report.removed,
                self.dataset.len()
            );
        }

        let vanished = self
            .selected
            .as_deref()
            .is_some_and(|filename| self.dataset.position(filename).is_none());
        if vanished {
            log::debug!("Selected image left the dataset");
            self.clear_selection();
        }
    }

    fn capture(&mut self) {
        let Some(frame) = self.frames.as_ref().and_then(FrameSource::read) else {
            log::warn!("No camera frame to capture");
            return;
        };

        match self.save_capture(&frame) {
            Ok(filename) => {
                self.reconcile();
                if self.dataset.position(&filename).is_some() {
                    self.select(Some(filename));
                }
            }
            Err(e) => {
                log::error!("{}", e);
                self.notify(false, format!("Capture failed: {}", e));
            }
        }
    }

    fn save_capture(&self, frame: &Frame) -> Result<String, CaptureError> {
        let directory = self.dataset.directory();
        std::fs::create_dir_all(directory).map_err(|source| CaptureError::Directory {
            path: directory.to_path_buf(),
            source,
        })?;

        let filename = capture_filename(&chrono::Local::now());
        let path = directory.join(&filename);
        frame
            .image
            .save(&path)
            .map_err(|source| CaptureError::Save {
                path: path.clone(),
                source,
            })?;

        log::info!("📸 Captured {}", path.display());
        Ok(filename)
    }

    fn delete_selected(&mut self) {
        let Some(filename) = self.selected.clone() else {
            return;
        };

        match self.dataset.remove(&filename) {
            Ok(()) => {
                log::info!("🗑️ Deleted {}", filename);
                self.clear_selection();
                self.reconcile();
            }
            Err(e) => {
                log::error!("{}", e);
                self.notify(false, format!("Could not delete {}: {}", filename, e));
            }
        }
    }

    fn start_calibration(&mut self) {
        if self.calibrating {
            log::debug!("Calibration already running");
            return;
        }

        let job = CalibrationJob {
            board: self.chessboard,
            directory: self.dataset.directory().to_path_buf(),
            filenames: self.dataset.filenames(),
        };

        self.calibrating = true;
        self.view.progress = Some((0, job.filenames.len()));
        self.view.status = String::from("Calibrating...");
        self.pool.spawn_calibration(job, self.vision.clone());
    }

    fn notify(&mut self, success: bool, message: String) {
        self.view.status = message.clone();
        self.notification = Some(Notification { success, message });
    }

    fn sync_view(&mut self) {
        if self.view.rows.as_slice() != self.dataset.records() {
            self.view.rows = self.dataset.records().to_vec();
        }
        self.view.selected = self.selected_index();
        self.view.can_delete = self.selected.is_some();
        self.view.calibrating = self.calibrating;
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("dataset", &self.dataset)
            .field("selected", &self.selected)
            .field("chessboard", &self.chessboard)
            .field("calibrating", &self.calibrating)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::DetectionState;
    use crate::testing::{self, Doubles, StillCamera};
    use crate::worker::calibration::NO_BOARDS_MESSAGE;
    use std::path::Path;
    use std::time::Duration;

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            image_dir: dir.to_path_buf(),
            default_chessboard: testing::board(),
            thumbnail_size: (40, 30),
            ..AppConfig::default()
        }
    }

    fn coordinator(dir: &Path, doubles: &Doubles) -> Coordinator {
        Coordinator::new(config(dir), doubles.vision(), None).unwrap()
    }

    /// Tick until `cond` holds; false on timeout
    fn tick_until(c: &mut Coordinator, mut cond: impl FnMut(&Coordinator) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            c.tick();
            if cond(c) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn state_of(c: &Coordinator, filename: &str) -> DetectionState {
        let index = c.dataset().position(filename).unwrap();
        c.dataset().get(index).unwrap().detection_state
    }

    #[test]
    fn test_startup_loads_directory() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_blank_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();

        let mut c = coordinator(dir.path(), &doubles);
        c.tick();

        assert_eq!(c.view().rows.len(), 2);
        assert!(c
            .view()
            .rows
            .iter()
            .all(|r| r.detection_state == DetectionState::Unknown));
        assert_eq!(c.view().columns_text, "4");
        assert!(!c.view().can_delete);
    }

    #[test]
    fn test_select_detects_and_shows_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.submit(UserEvent::Select(Some("a.jpg".into())));
        assert!(tick_until(&mut c, |c| c.view().annotated_thumbnail.is_some()));

        assert_eq!(state_of(&c, "a.jpg"), DetectionState::Detected);
        assert!(c.view().raw_thumbnail.is_some());
        assert_eq!(c.view().selected, Some(0));
        assert!(c.view().can_delete);
    }

    #[test]
    fn test_one_user_event_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.submit(UserEvent::EditColumns("7".into()));
        c.submit(UserEvent::EditRows("5".into()));
        c.tick();
        assert_eq!(c.chessboard().columns, 7);
        assert_eq!(c.chessboard().rows, 3);

        c.tick();
        assert_eq!(c.chessboard().rows, 5);
    }

    #[test]
    fn test_edits_between_ticks_build_on_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        // Each keystroke is built from the text the field shows right now
        c.submit(UserEvent::EditSquareSize("1".into()));
        assert_eq!(c.view().square_size_text, "1");
        let typed = format!("{}2", c.view().square_size_text);
        c.submit(UserEvent::EditSquareSize(typed));
        assert_eq!(c.view().square_size_text, "12");

        c.tick();
        assert_eq!(c.view().square_size_text, "12");
        assert_eq!(c.chessboard().square_size_mm, 1.0);

        let typed = format!("{}.5", c.view().square_size_text);
        c.submit(UserEvent::EditSquareSize(typed));
        c.tick();
        c.tick();
        assert_eq!(c.view().square_size_text, "12.5");
        assert_eq!(c.chessboard().square_size_mm, 12.5);
    }

    #[test]
    fn test_invalid_edit_reverts_field() {
        let dir = tempfile::tempdir().unwrap();
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::EditColumns("4x".into()));
        assert_eq!(c.view().columns_text, "4");
        assert_eq!(c.chessboard().columns, 4);

        c.handle_user_event(UserEvent::EditSquareSize("12.5".into()));
        assert_eq!(c.chessboard().square_size_mm, 12.5);

        c.handle_user_event(UserEvent::EditRows("".into()));
        assert_eq!(c.view().rows_text, "");
        assert_eq!(c.chessboard().rows, 3);
    }

    #[test]
    fn test_stale_thumbnails_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_board_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Select(Some("a.jpg".into())));
        let first = c.latest_request;
        c.handle_user_event(UserEvent::Select(Some("b.jpg".into())));
        let second = c.latest_request;
        c.view.raw_thumbnail = None;
        c.view.annotated_thumbnail = None;

        // Old request for the old file
        c.apply_worker_event(WorkerEvent::AnnotatedThumbnail {
            request: first,
            filename: "a.jpg".into(),
            image: RgbImage::new(4, 3),
        });
        assert!(c.view().annotated_thumbnail.is_none());

        // Old request for the file that is selected again
        c.apply_worker_event(WorkerEvent::RawThumbnail {
            request: first,
            filename: "b.jpg".into(),
            image: RgbImage::new(4, 3),
        });
        assert!(c.view().raw_thumbnail.is_none());

        // Outcomes always reach the dataset
        c.apply_worker_event(WorkerEvent::DetectionOutcome {
            filename: "a.jpg".into(),
            found: false,
        });
        assert_eq!(state_of(&c, "a.jpg"), DetectionState::NotDetected);

        c.apply_worker_event(WorkerEvent::RawThumbnail {
            request: second,
            filename: "b.jpg".into(),
            image: RgbImage::new(4, 3),
        });
        assert!(c.view().raw_thumbnail.is_some());
    }

    #[test]
    fn test_delete_clears_selection() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_blank_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Select(Some("a.jpg".into())));
        let request = c.latest_request;
        c.handle_user_event(UserEvent::DeleteSelected);
        c.sync_view();

        assert!(!dir.path().join("a.jpg").exists());
        assert_eq!(c.dataset().filenames(), vec!["b.jpg".to_string()]);
        assert_eq!(c.selected_index(), None);
        assert!(!c.view().can_delete);

        c.apply_worker_event(WorkerEvent::AnnotatedThumbnail {
            request,
            filename: "a.jpg".into(),
            image: RgbImage::new(4, 3),
        });
        assert!(c.view().annotated_thumbnail.is_none());
        // Outcome for a vanished file is harmless
        c.apply_worker_event(WorkerEvent::DetectionOutcome {
            filename: "a.jpg".into(),
            found: true,
        });
        assert_eq!(c.dataset().len(), 1);
    }

    #[test]
    fn test_failed_delete_notifies_and_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        // A directory in place of the file makes the delete fail; listings
        // skip directories, so register it by hand
        std::fs::create_dir(dir.path().join("stuck.jpg")).unwrap();
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);
        c.dataset.reconcile(&["a.jpg".to_string(), "stuck.jpg".to_string()]);
        assert_eq!(c.dataset().len(), 2);

        c.handle_user_event(UserEvent::Select(Some("stuck.jpg".into())));
        c.handle_user_event(UserEvent::DeleteSelected);
        c.sync_view();

        let notification = c.take_notification().unwrap();
        assert!(!notification.success);
        assert!(notification.message.contains("stuck.jpg"));
        assert_eq!(c.view().status, notification.message);
        assert_eq!(c.selected_filename(), Some("stuck.jpg"));
        assert_eq!(c.selected_index(), Some(1));
        assert!(c.view().can_delete);
        assert!(dir.path().join("stuck.jpg").is_dir());
        assert_eq!(c.dataset().len(), 2);
    }

    #[test]
    fn test_delete_without_selection_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::DeleteSelected);

        assert!(dir.path().join("a.jpg").exists());
        assert_eq!(c.dataset().len(), 1);
        assert!(c.take_notification().is_none());
    }

    #[test]
    fn test_rescan_drops_vanished_selection() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_board_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Select(Some("b.jpg".into())));
        std::fs::remove_file(dir.path().join("b.jpg")).unwrap();
        testing::write_board_image(dir.path(), "c.jpg");
        c.handle_user_event(UserEvent::Rescan);

        assert_eq!(c.selected_filename(), None);
        assert_eq!(
            c.dataset().filenames(),
            vec!["a.jpg".to_string(), "c.jpg".to_string()]
        );
    }

    #[test]
    fn test_queued_select_names_the_clicked_file() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_board_image(dir.path(), "b.jpg");
        testing::write_board_image(dir.path(), "c.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        // Both clicks land before the delete has shifted the rows
        c.handle_user_event(UserEvent::Select(Some("a.jpg".into())));
        c.submit(UserEvent::DeleteSelected);
        c.submit(UserEvent::Select(Some("b.jpg".into())));
        c.tick();
        c.tick();

        assert_eq!(c.selected_filename(), Some("b.jpg"));
        assert_eq!(c.view().selected, Some(0));
    }

    #[test]
    fn test_select_of_vanished_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_board_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Select(Some("a.jpg".into())));
        let request = c.latest_request;
        std::fs::remove_file(dir.path().join("b.jpg")).unwrap();
        c.handle_user_event(UserEvent::Rescan);
        c.handle_user_event(UserEvent::Select(Some("b.jpg".into())));

        assert_eq!(c.selected_filename(), Some("a.jpg"));
        assert_eq!(c.latest_request, request);
    }

    #[test]
    fn test_selection_index_follows_file() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "a.jpg");
        testing::write_board_image(dir.path(), "b.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Select(Some("b.jpg".into())));
        std::fs::remove_file(dir.path().join("a.jpg")).unwrap();
        c.handle_user_event(UserEvent::Rescan);

        assert_eq!(c.selected_filename(), Some("b.jpg"));
        assert_eq!(c.selected_index(), Some(0));
    }

    #[test]
    fn test_capture_without_camera_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        let doubles = Doubles::new();
        let mut c = coordinator(&image_dir, &doubles);

        c.handle_user_event(UserEvent::Capture);

        assert!(c.dataset().is_empty());
        assert!(!image_dir.exists());
    }

    #[test]
    fn test_capture_saves_and_selects() {
        let dir = tempfile::tempdir().unwrap();
        let image_dir = dir.path().join("images");
        let doubles = Doubles::new();
        let frames = FrameSource::start(|| Ok(StillCamera), 10);
        let mut c = Coordinator::new(config(&image_dir), doubles.vision(), Some(frames)).unwrap();

        assert!(tick_until(&mut c, |c| c.view().live_frame.is_some()));
        assert!(c.view().camera_available);

        c.submit(UserEvent::Capture);
        c.tick();

        assert_eq!(c.dataset().len(), 1);
        let filename = c.dataset().filenames().remove(0);
        assert!(filename.ends_with(".jpg"));
        assert_eq!(filename.len(), "YYYYMMDD_HHMMSS.jpg".len());
        assert!(image_dir.join(&filename).is_file());
        assert_eq!(c.selected_index(), Some(0));

        // The new capture goes straight to detection
        assert!(tick_until(&mut c, |c| {
            c.dataset().get(0).map(|r| r.detection_state) == Some(DetectionState::Detected)
        }));

        c.shutdown();
        assert!(c.frames.is_none());
    }

    #[test]
    fn test_display_scale_applies_to_live_frame() {
        let dir = tempfile::tempdir().unwrap();
        let doubles = Doubles::new();
        let frames = FrameSource::start(|| Ok(StillCamera), 10);
        let mut c = Coordinator::new(config(dir.path()), doubles.vision(), Some(frames)).unwrap();

        c.submit(UserEvent::SetDisplayScale(DisplayScale::Fit(32)));
        assert!(tick_until(&mut c, |c| {
            c.view().live_frame.as_ref().map(|f| f.dimensions()) == Some((32, 24))
        }));

        c.submit(UserEvent::SetDisplayScale(DisplayScale::Original));
        assert!(tick_until(&mut c, |c| {
            c.view().live_frame.as_ref().map(|f| f.dimensions()) == Some(testing::IMAGE_SIZE)
        }));
    }

    #[test]
    fn test_calibration_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "img1.jpg");
        testing::write_blank_image(dir.path(), "img2.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.submit(UserEvent::Calibrate);
        c.tick();
        assert!(tick_until(&mut c, |c| !c.is_calibrating()));
        let notification = c.take_notification().unwrap();
        assert!(notification.success, "{}", notification.message);
        assert!(c.take_notification().is_none());

        assert_eq!(state_of(&c, "img1.jpg"), DetectionState::Detected);
        assert_eq!(state_of(&c, "img2.jpg"), DetectionState::NotDetected);
        assert_eq!(doubles.solver_calls().len(), 1);
        assert_eq!(doubles.solver_calls()[0].views, 1);
        assert_eq!(doubles.saved().len(), 1);
        assert_eq!(c.view().progress, None);
        assert!(!c.view().calibrating);
    }

    #[test]
    fn test_calibration_locks_inputs_and_trigger() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_board_image(dir.path(), "img1.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.handle_user_event(UserEvent::Calibrate);
        c.handle_user_event(UserEvent::Calibrate);
        c.handle_user_event(UserEvent::EditColumns("8".into()));

        assert!(c.is_calibrating());
        assert_eq!(c.chessboard().columns, 4);
        assert_eq!(c.view().columns_text, "4");
        assert_eq!(c.view().progress, Some((0, 1)));

        assert!(tick_until(&mut c, |c| !c.is_calibrating()));
        assert_eq!(doubles.solver_calls().len(), 1);

        c.handle_user_event(UserEvent::EditColumns("8".into()));
        assert_eq!(c.chessboard().columns, 8);
    }

    #[test]
    fn test_calibration_without_boards_notifies_failure() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_blank_image(dir.path(), "img2.jpg");
        let doubles = Doubles::new();
        let mut c = coordinator(dir.path(), &doubles);

        c.submit(UserEvent::Calibrate);
        c.tick();
        assert!(tick_until(&mut c, |c| !c.is_calibrating()));

        let notification = c.take_notification().unwrap();
        assert!(!notification.success);
        assert_eq!(notification.message, NO_BOARDS_MESSAGE);
        assert!(doubles.solver_calls().is_empty());
    }

    #[test]
    fn test_capture_filename_format() {
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(capture_filename(&time), "20240309_140507.jpg");
    }
}
