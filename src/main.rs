use std::sync::Arc;
use std::time::Duration;

use calib_capture::app::Coordinator;
use calib_capture::capture::FrameSource;
use calib_capture::config::AppConfig;
use calib_capture::vision::{opencv, JsonCoefficientStore};
use calib_capture::{logging, ui};

fn main() -> iced::Result {
    logging::init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::error!("❌ {}, falling back to defaults", e);
        AppConfig::default()
    });

    let store = Arc::new(JsonCoefficientStore::new(config.coefficients_path.clone()));
    let frames = FrameSource::start(
        opencv::camera_opener(config.camera_index),
        config.fps_window,
    );
    let tick_interval = Duration::from_millis(config.tick_interval_ms);

    let coordinator = match Coordinator::new(config, opencv::vision(store), Some(frames)) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            log::error!("❌ Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    ui::run(coordinator, tick_interval)
}
