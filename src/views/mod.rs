pub mod image_viewer;
pub mod stack_list;

pub use image_viewer::{image_panel, SlicePreview};
pub use stack_list::stack_panel;
