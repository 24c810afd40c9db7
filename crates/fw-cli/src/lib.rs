//! Ferry watch CLI library.
//!
//! This crate provides the CLI interface for the ferry watcher.

mod cli;
pub mod commands;
mod config;
pub mod console;

pub use cli::{Cli, Commands};
pub use config::Config;
