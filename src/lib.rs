//! Terminal time boxing. Every project has a target duration and a live timer, and every
//! started-then-stopped session ends up as a log with an optional tag.
//!

pub mod cli;
pub mod engine;
pub mod storage;
pub mod tui;
pub mod utils;
