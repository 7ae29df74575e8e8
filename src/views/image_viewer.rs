use crate::image_pipeline::PixelBuffer;
use crate::message::Message;
use crate::model::{Stack, StackId};
use crate::utils::{format_dimensions, format_slice_position};
use iced::widget::image::Handle;
use iced::widget::{button, column, container, row, text, Image};
use iced::{Alignment, Element, Length};

#[derive(Debug, Clone)]
pub struct SlicePreview {
    pub stack: StackId,
    pub index: usize,
    pub handle: Handle,
    pub dimensions: String,
}

impl SlicePreview {
    pub fn from_pixels(stack: StackId, index: usize, pixels: &PixelBuffer) -> Self {
        Self {
            stack,
            index,
            handle: Handle::from_rgba(pixels.width(), pixels.height(), pixels.to_rgba()),
            dimensions: format_dimensions(pixels),
        }
    }

    pub fn shows(&self, stack: StackId, index: usize) -> bool {
        self.stack == stack && self.index == index
    }
}

pub fn image_panel(
    active: Option<&Stack>,
    slice: usize,
    preview: Option<&SlicePreview>,
) -> Element<'static, Message> {
    let Some(stack) = active else {
        return text("Select a stack to preview its slices").into();
    };

    let preview = preview.filter(|preview| preview.shows(stack.id(), slice));
    let picture: Element<'static, Message> = match preview {
        Some(preview) => Image::new(preview.handle.clone())
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        None => container(text("Decoding slice…"))
            .width(Length::Fill)
            .height(Length::Fill)
            .align_x(Alignment::Center)
            .align_y(Alignment::Center)
            .into(),
    };

    let previous = button(text("◀")).on_press_maybe((slice > 0).then_some(Message::PreviousSlice));
    let next = button(text("▶"))
        .on_press_maybe((slice + 1 < stack.len()).then_some(Message::NextSlice));
    let navigation = row![
        previous,
        text(format_slice_position(slice, stack.len())),
        next
    ]
    .spacing(12)
    .align_y(Alignment::Center);

    let details = preview
        .map(|preview| preview.dimensions.clone())
        .unwrap_or_default();

    column![picture, navigation, text(details).size(12)]
        .spacing(12)
        .align_x(Alignment::Center)
        .into()
}
