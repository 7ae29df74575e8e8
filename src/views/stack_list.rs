use crate::message::Message;
use crate::model::StackRegistry;
use crate::utils::{format_decision, truncate_label};
use iced::widget::text::Wrapping;
use iced::widget::{button, column, row, text, Column};
use iced::Length;

pub fn stack_panel(registry: &StackRegistry) -> Column<'_, Message> {
    let root = column![text("Loaded Stacks").size(20)];

    if registry.is_empty() {
        return root.push(text("No stacks loaded"));
    }

    let active = registry.active_id();
    registry
        .stacks()
        .iter()
        .fold(root, |column, stack| {
            let label = stack_label(
                stack.name(),
                stack.len(),
                active == Some(stack.id()),
            );
            let status = format_decision(registry.decision(stack.name()));

            column.push(
                row![
                    button(
                        column![
                            text(label).wrapping(Wrapping::Word),
                            text(status).size(12),
                        ]
                        .width(Length::Fill),
                    )
                    .width(Length::Fill)
                    .on_press(Message::SelectStack(stack.id())),
                    button(text("✕")).on_press(Message::DiscardStack(stack.id())),
                ]
                .spacing(6),
            )
        })
        .spacing(6)
}

fn stack_label(name: &str, slices: usize, is_active: bool) -> String {
    let suffix = if slices == 1 { "" } else { "s" };
    let label = format!("{} ({slices} slice{suffix})", truncate_label(name));
    if is_active {
        format!("▶ {label}")
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_stack_is_marked() {
        assert_eq!(stack_label("series-1", 3, true), "▶ series-1 (3 slices)");
        assert_eq!(stack_label("series-2", 1, false), "series-2 (1 slice)");
    }
}
