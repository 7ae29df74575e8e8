use crate::message::Message;
use crate::model::{Outcome, ValidationState};
use iced::widget::text::Wrapping;
use iced::widget::{button, container, row, text, Container, Space};
use iced::{Alignment, Background, Color, Element, Length, Shadow, Theme};

const ALL_ACTIONS: [Outcome; 2] = [Outcome::Confirmed, Outcome::Rejected];

pub fn available_actions(display_buttons: bool) -> &'static [Outcome] {
    if display_buttons {
        &ALL_ACTIONS
    } else {
        &[]
    }
}

pub fn confirm_reject_control(
    display_buttons: bool,
    state: ValidationState,
) -> Element<'static, Message> {
    let actions = available_actions(display_buttons);
    if actions.is_empty() {
        return Space::new(Length::Shrink, Length::Shrink).into();
    }

    let buttons = actions.iter().enumerate().fold(row![], |buttons, (index, &outcome)| {
        let position = if index == 0 {
            SegmentPosition::Left
        } else {
            SegmentPosition::Right
        };
        buttons.push(outcome_button(outcome, state, position).width(Length::FillPortion(1)))
    });

    let control: Container<'static, Message> = container(buttons.spacing(0))
        .padding(3)
        .width(Length::Fill)
        .style(segmented_container_style);
    control.into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentPosition {
    Left,
    Right,
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Confirmed => "Confirm",
        Outcome::Rejected => "Reject",
    }
}

fn outcome_button(
    outcome: Outcome,
    state: ValidationState,
    position: SegmentPosition,
) -> iced::widget::Button<'static, Message> {
    let is_active = ValidationState::from(outcome) == state;
    let content = container(text(outcome_label(outcome)).size(14).wrapping(Wrapping::None))
        .width(Length::Fill)
        .height(Length::Fixed(32.0))
        .align_x(Alignment::Center)
        .align_y(Alignment::Center)
        .padding([6, 16]);

    button(content)
        .padding(0)
        .on_press(Message::Submit(outcome))
        .style(move |theme, status| outcome_button_style(theme, status, outcome, is_active, position))
}

fn segmented_container_style(theme: &Theme) -> iced::widget::container::Style {
    let palette = theme.extended_palette();

    iced::widget::container::Style {
        background: Some(Background::Color(palette.background.strong.color)),
        border: iced::border::Border {
            color: palette.background.strong.color.scale_alpha(0.6),
            width: 1.0,
            radius: iced::border::Radius::new(999.0),
        },
        ..Default::default()
    }
}

fn outcome_button_style(
    theme: &Theme,
    status: iced::widget::button::Status,
    outcome: Outcome,
    is_active: bool,
    position: SegmentPosition,
) -> iced::widget::button::Style {
    let palette = theme.extended_palette();
    let accent = match outcome {
        Outcome::Confirmed => palette.success.strong,
        Outcome::Rejected => palette.danger.strong,
    };

    let mut background_color = if is_active {
        accent.color
    } else {
        palette.background.strong.color.scale_alpha(0.4)
    };

    match status {
        iced::widget::button::Status::Hovered => {
            background_color = if is_active {
                accent.color.scale_alpha(0.85)
            } else {
                palette.background.base.color.scale_alpha(0.8)
            };
        }
        iced::widget::button::Status::Pressed => {
            background_color = accent.color.scale_alpha(0.9);
        }
        iced::widget::button::Status::Disabled => {
            background_color = background_color.scale_alpha(0.5);
        }
        iced::widget::button::Status::Active => {}
    }

    let text_color = if is_active {
        accent.text
    } else {
        palette.background.base.text
    };

    let radius = match position {
        SegmentPosition::Left => iced::border::Radius {
            top_left: 999.0,
            top_right: 10.0,
            bottom_right: 10.0,
            bottom_left: 999.0,
        },
        SegmentPosition::Right => iced::border::Radius {
            top_left: 10.0,
            top_right: 999.0,
            bottom_right: 999.0,
            bottom_left: 10.0,
        },
    };

    iced::widget::button::Style {
        background: Some(Background::Color(background_color)),
        text_color,
        border: iced::border::Border {
            color: Color::TRANSPARENT,
            width: 0.0,
            radius,
        },
        shadow: Shadow::default(),
    }
}
