//! Terminal rendering of monitor status.

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Local, Utc};

use fw_core::{StatusSink, StatusUpdate};

/// Writes one timestamped line per status update.
pub struct ConsoleSink<W> {
    writer: Mutex<W>,
}

impl ConsoleSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> StatusSink for ConsoleSink<W> {
    fn notify(&self, update: &StatusUpdate) {
        tracing::trace!(?update, "status update");
        let line = render_line(update);
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        // A closed terminal must not take the monitor down with it.
        let _ = writeln!(writer, "[{}] {line}", Local::now().format("%H:%M:%S"));
    }
}

/// Renders an update without the timestamp prefix.
pub fn render_line(update: &StatusUpdate) -> String {
    match update {
        StatusUpdate::BookingSucceeded { .. } => format!("SUCCESS: {update}"),
        StatusUpdate::BookingFailed { .. } => format!("FAILED: {update}"),
        StatusUpdate::QueryFailed { .. } => format!("warning: {update}"),
        _ => update.to_string(),
    }
}

/// Clock time of a departure, as shown in schedule listings.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "N/A".to_string(), |t| t.format("%H:%M").to_string())
}
