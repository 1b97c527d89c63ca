use iced::widget::image::Handle;
use iced::widget::{
    button, column, container, image, pick_list, progress_bar, row, scrollable, text, text_input,
    Column,
};
use iced::{Alignment, Element, Length};
use ::image::{DynamicImage, RgbImage};

use super::Message;
use crate::app::{UserEvent, ViewState};
use crate::state::input::DisplayScale;

fn user(event: UserEvent) -> Message {
    Message::User(event)
}

/// Upload an RGB buffer as an iced image
fn to_handle(rgb: &RgbImage) -> Handle {
    let (width, height) = rgb.dimensions();
    let rgba = DynamicImage::ImageRgb8(rgb.clone()).into_rgba8();
    Handle::from_rgba(width, height, rgba.into_raw())
}

fn picture<'a>(rgb: Option<&RgbImage>, empty: &'a str) -> Element<'a, Message> {
    match rgb {
        Some(rgb) => image(to_handle(rgb)).into(),
        None => container(text(empty).size(14))
            .width(Length::Fill)
            .height(120)
            .center_x(Length::Fill)
            .center_y(120)
            .into(),
    }
}

/// Camera feed, rates, display scaling and the capture button
pub fn live_panel(state: &ViewState) -> Element<'_, Message> {
    let feed = if state.camera_available {
        picture(state.live_frame.as_ref(), "Waiting for camera...")
    } else {
        picture(None, "Camera not available")
    };

    let rates = text(format!(
        "Capture: {:.1} fps   Process: {:.1} fps",
        state.capture_fps, state.process_fps
    ))
    .size(14);

    let scale = pick_list(DisplayScale::ALL, Some(state.display_scale), |scale| {
        user(UserEvent::SetDisplayScale(scale))
    });

    let capture = button("Capture")
        .on_press_maybe(state.live_frame.is_some().then_some(user(UserEvent::Capture)))
        .padding(10);

    column![feed, rates, row![scale, capture].spacing(12)]
        .spacing(12)
        .width(Length::FillPortion(3))
        .into()
}

/// Filename / detection table with delete and rescan
pub fn dataset_panel(state: &ViewState) -> Element<'_, Message> {
    let rows: Column<Message> = state
        .rows
        .iter()
        .enumerate()
        .fold(Column::new().spacing(2), |rows, (index, record)| {
            let style = if state.selected == Some(index) {
                button::primary
            } else {
                button::text
            };

            rows.push(
                button(
                    row![
                        text(&record.filename).width(Length::Fill),
                        text(record.detection_state.to_string()),
                    ]
                    .spacing(8),
                )
                .on_press(user(UserEvent::Select(Some(record.filename.clone()))))
                .style(style)
                .width(Length::Fill),
            )
        });

    let delete = button("Delete selected")
        .on_press_maybe(state.can_delete.then_some(user(UserEvent::DeleteSelected)))
        .padding(8);
    let rescan = button("Rescan")
        .on_press(user(UserEvent::Rescan))
        .padding(8);

    column![
        text(format!("Images ({})", state.rows.len())).size(18),
        scrollable(rows).height(Length::Fill),
        row![delete, rescan].spacing(8),
    ]
    .spacing(10)
    .width(Length::FillPortion(2))
    .into()
}

fn number_field<'a>(
    label: &'a str,
    value: &'a str,
    locked: bool,
    on_input: fn(String) -> UserEvent,
) -> Element<'a, Message> {
    let input = text_input(label, value).width(90);
    let input = if locked {
        input
    } else {
        input.on_input(move |s| user(on_input(s)))
    };

    row![text(label).width(Length::Fill), input]
        .spacing(8)
        .align_y(Alignment::Center)
        .into()
}

/// Thumbnails, board geometry inputs and the calibrate control
pub fn board_panel(state: &ViewState) -> Element<'_, Message> {
    let locked = state.calibrating;

    let fields = column![
        number_field("Columns", &state.columns_text, locked, UserEvent::EditColumns),
        number_field("Rows", &state.rows_text, locked, UserEvent::EditRows),
        number_field(
            "Square size (mm)",
            &state.square_size_text,
            locked,
            UserEvent::EditSquareSize
        ),
    ]
    .spacing(6);

    let calibrate = button(if locked { "Calibrating..." } else { "Calibrate" })
        .on_press_maybe((!locked).then_some(user(UserEvent::Calibrate)))
        .padding(10);

    let mut panel = column![
        text("Original").size(14),
        picture(state.raw_thumbnail.as_ref(), "No image selected"),
        text("Detected corners").size(14),
        picture(state.annotated_thumbnail.as_ref(), ""),
        fields,
        calibrate,
    ]
    .spacing(10)
    .width(Length::FillPortion(2));

    if let Some((processed, total)) = state.progress {
        let fraction = if total == 0 {
            0.0
        } else {
            processed as f32 / total as f32
        };
        panel = panel
            .push(progress_bar(0.0..=1.0, fraction))
            .push(text(format!("{} / {}", processed, total)).size(14));
    }

    panel.into()
}
