//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::schedule::ScheduleArgs;
use crate::commands::watch::WatchArgs;

/// Ferry departure watcher.
///
/// Watches selected sailings for free car spaces and books the first one
/// that opens up.
#[derive(Debug, Parser)]
#[command(name = "fw", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the sailings for a direction and date.
    Schedule(ScheduleArgs),

    /// Watch sailings and book the first one with a free car space.
    Watch(WatchArgs),
}
