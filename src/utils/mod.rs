pub mod formatting;

pub use formatting::{format_decision, format_dimensions, format_slice_position, truncate_label};
