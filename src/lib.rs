pub mod app;
pub mod components;
pub mod config;
pub mod image_pipeline;
pub mod message;
pub mod model;
pub mod utils;
pub mod views;
