pub mod config;
pub mod console;
pub mod presentation;
pub mod scene;
