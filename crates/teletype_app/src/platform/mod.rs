mod app;
mod commands;
mod config;
mod effects;
mod export;
mod history;
mod logging;
mod persistence;
mod render;

pub use app::run_app;
