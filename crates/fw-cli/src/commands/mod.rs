//! CLI subcommand implementations.

use chrono::{Local, NaiveDate};

pub mod schedule;
pub mod watch;

/// The local calendar date, used when `--date` is omitted.
fn today() -> NaiveDate {
    Local::now().date_naive()
}
