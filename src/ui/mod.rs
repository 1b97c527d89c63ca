//! Desktop front-end (iced)
//!
//! A thin shell around [`Coordinator`]: a timer subscription drives `tick`,
//! widgets forward [`UserEvent`]s, and `view` renders the coordinator's
//! [`ViewState`](crate::app::ViewState). No state lives here besides the
//! notification banner.
//!
//! Architecture:
//! - `panels.rs` - live view, dataset table and board controls

mod panels;

use iced::widget::{button, column, container, row, text};
use iced::{time, window, Element, Length, Subscription, Task, Theme};
use std::time::Duration;

use crate::app::{Coordinator, Notification, UserEvent};

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Timer fired; run one coordinator iteration
    Tick,
    /// Forwarded to the coordinator's queue
    User(UserEvent),
    DismissNotification,
    /// The window is about to close; stop the camera first
    CloseRequested(window::Id),
}

/// Main application state
pub struct CalibrationApp {
    coordinator: Coordinator,
    tick_interval: Duration,
    /// Banner for the last calibration, capture or delete outcome
    notification: Option<Notification>,
}

impl CalibrationApp {
    fn new(coordinator: Coordinator, tick_interval: Duration) -> (Self, Task<Message>) {
        log::info!(
            "🖥️ Calibration UI ready, {} images in dataset",
            coordinator.dataset().len()
        );

        (
            Self {
                coordinator,
                tick_interval,
                notification: None,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                self.coordinator.tick();
                if let Some(notification) = self.coordinator.take_notification() {
                    self.notification = Some(notification);
                }
                Task::none()
            }
            Message::User(event) => {
                self.coordinator.submit(event);
                Task::none()
            }
            Message::DismissNotification => {
                self.notification = None;
                Task::none()
            }
            Message::CloseRequested(id) => {
                self.coordinator.shutdown();
                window::close(id)
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            time::every(self.tick_interval).map(|_| Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let state = self.coordinator.view();

        let body = row![
            panels::live_panel(state),
            panels::dataset_panel(state),
            panels::board_panel(state),
        ]
        .spacing(20)
        .height(Length::Fill);

        let mut content = column![].spacing(12).padding(16);
        if let Some(notification) = &self.notification {
            content = content.push(notification_banner(notification));
        }
        content = content.push(body).push(text(&state.status).size(14));

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn notification_banner(notification: &Notification) -> Element<'_, Message> {
    let icon = if notification.success { "✅" } else { "❌" };

    row![
        text(format!("{} {}", icon, notification.message))
            .size(16)
            .width(Length::Fill),
        button("OK").on_press(Message::DismissNotification).padding(6),
    ]
    .spacing(12)
    .into()
}

/// Run the desktop app until the window closes
pub fn run(coordinator: Coordinator, tick_interval: Duration) -> iced::Result {
    iced::application(
        "Camera Calibration",
        CalibrationApp::update,
        CalibrationApp::view,
    )
    .subscription(CalibrationApp::subscription)
    .theme(CalibrationApp::theme)
    .exit_on_close_request(false)
    .centered()
    .run_with(move || CalibrationApp::new(coordinator, tick_interval))
}
