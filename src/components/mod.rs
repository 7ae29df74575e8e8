pub mod confirm_reject;

pub use confirm_reject::confirm_reject_control;
