//! Daily run log.
//!
//! One append-only file per calendar day (`<YYYY-MM-DD>.log`), one line per
//! lifecycle event:
//!
//! ```text
//! [2026-10-16T09:12:44.120+00:00] [DEEP] Executing skill: react-deploy
//! ```

use crate::types::Mode;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A single log line.
#[derive(Debug, Clone)]
pub struct JournalLine {
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    pub message: String,
}

impl JournalLine {
    pub fn new(timestamp: DateTime<Utc>, mode: Mode, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            mode,
            message: message.into(),
        }
    }

    fn render(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            self.mode.as_str(),
            sanitize_message(&self.message)
        )
    }
}

/// Keep one event per line.
fn sanitize_message(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

/// Log file path for a calendar day.
pub fn journal_path(logs_dir: &Path, day: NaiveDate) -> PathBuf {
    logs_dir.join(format!("{}.log", day.format("%Y-%m-%d")))
}

/// Append-only writer for one day's log file.
pub struct JournalWriter {
    writer: BufWriter<File>,
}

impl std::fmt::Debug for JournalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("writer", &"BufWriter<File>")
            .finish()
    }
}

impl JournalWriter {
    /// Open (creating if needed) the log file at `path` for appending.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_line(&mut self, line: &JournalLine) -> std::io::Result<()> {
        writeln!(self.writer, "{}", line.render())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Append one line to the log file for the line's day.
pub fn append(logs_dir: &Path, line: &JournalLine) -> std::io::Result<PathBuf> {
    let path = journal_path(logs_dir, line.timestamp.date_naive());
    let mut writer = JournalWriter::open(&path)?;
    writer.write_line(line)?;
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, h, m, 0).unwrap()
    }

    #[test]
    fn line_format() {
        let line = JournalLine::new(at(9, 30), Mode::Deep, "Executing skill: lint");
        assert_eq!(
            line.render(),
            "[2026-10-16T09:30:00.000+00:00] [DEEP] Executing skill: lint"
        );
    }

    #[test]
    fn newlines_are_flattened() {
        let line = JournalLine::new(at(9, 30), Mode::Quick, "a\nb\r\nc");
        assert!(line.render().ends_with("a b  c"));
    }

    #[test]
    fn journal_path_is_per_day() {
        let path = journal_path(Path::new("/sfo/logs"), at(0, 0).date_naive());
        assert_eq!(path, PathBuf::from("/sfo/logs/2026-10-16.log"));
    }

    #[test]
    fn append_creates_directory_and_appends() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");

        append(&logs, &JournalLine::new(at(1, 0), Mode::Standard, "first")).unwrap();
        let path = append(&logs, &JournalLine::new(at(2, 0), Mode::Standard, "second")).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[STANDARD] first"));
        assert!(lines[1].ends_with("[STANDARD] second"));
    }
}
