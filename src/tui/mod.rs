//! Terminal chat client built on Ratatui.

mod app;
mod backend;
mod compose;
pub mod log_capture;
mod messages;
mod sidebar;
mod ui;

pub use app::run;
