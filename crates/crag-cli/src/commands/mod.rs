pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod favorite;
pub mod file;
pub mod list;
pub mod sync;
