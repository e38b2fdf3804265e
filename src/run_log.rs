//! Run log and summary aggregation
//!
//! One `RunLog` exists per deployment run. Every component appends through it;
//! each entry is written straight to the run's log file as
//! `<YYYY-MM-DD HH:MM:SS> - <LEVEL> - <message>` and echoed to the console.
//!
//! There is a single writer (the control thread), so appends need no locking.
//! If the log file cannot be created or written, the run continues with an
//! in-memory record and an on-screen notice; asking such a log for a summary
//! reports `LogTargetUnavailable` instead of failing the process.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{OrchestratorError, Result};
use crate::types::LogLevel;

/// Timestamp layout used in log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between the fields of a log line
const FIELD_SEPARATOR: &str = " - ";

/// Replaces line breaks inside a message so every entry stays on one line
pub const LINE_JOINER: &str = " | ";

/// Upper bound on `-N` suffixes tried when the per-second file name is taken
const MAX_NAME_SUFFIX: u32 = 1000;

/// Collapse a multi-line message (e.g. a remote stderr dump) onto one line
fn single_line(message: String) -> String {
    if !message.contains(['\n', '\r']) {
        return message;
    }
    message
        .split(['\r', '\n'])
        .map(str::trim_end)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(LINE_JOINER)
}

/// Create a fresh log file under `log_root`, never reusing an existing one.
///
/// Tries `update_<stamp>.log`, then `update_<stamp>-1.log`, `-2`, ...
fn create_log_file(log_root: &Path, stamp: &str) -> std::io::Result<(PathBuf, File)> {
    fs::create_dir_all(log_root)?;
    let mut suffix = 0;
    loop {
        let file_name = if suffix == 0 {
            format!("update_{}.log", stamp)
        } else {
            format!("update_{}-{}.log", stamp, suffix)
        };
        let path = log_root.join(file_name);
        match OpenOptions::new().create_new(true).append(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && suffix < MAX_NAME_SUFFIX => {
                suffix += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One append-only record of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Render the entry in log file format
    pub fn to_line(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.message,
            sep = FIELD_SEPARATOR
        )
    }

    /// Parse a log file line; returns None for lines not in the run log format
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, FIELD_SEPARATOR);
        let timestamp = NaiveDateTime::parse_from_str(fields.next()?, TIMESTAMP_FORMAT).ok()?;
        let level = LogLevel::from_str(fields.next()?.trim()).ok()?;
        let message = fields.next().unwrap_or_default().to_string();
        Some(Self {
            timestamp,
            level,
            message,
        })
    }
}

/// Where entries are persisted
#[derive(Debug)]
enum LogTarget {
    /// Test and dry-run mode: entries live in memory only
    Memory,
    File { path: PathBuf, file: File },
    /// A file target was requested but could not be used
    Unavailable { path: PathBuf, reason: String },
}

/// Append-only log owned by one deployment run
#[derive(Debug)]
pub struct RunLog {
    started_at: DateTime<Local>,
    started: Instant,
    target: LogTarget,
    entries: Vec<LogEntry>,
    echo: bool,
}

impl RunLog {
    /// Open a new log file named after the run start time under `log_root`.
    ///
    /// Two runs starting within the same second get distinct files; an
    /// existing log is never appended to.
    ///
    /// Never fails: an unusable target degrades to in-memory logging with a
    /// notice on stderr.
    pub fn open(log_root: &Path) -> Self {
        let started_at = Local::now();
        let stamp = started_at.format("%Y%m%d_%H%M%S").to_string();

        let target = match create_log_file(log_root, &stamp) {
            Ok((path, file)) => LogTarget::File { path, file },
            Err(e) => {
                let path = log_root.join(format!("update_{}.log", stamp));
                eprintln!(
                    "NOTICE: cannot open run log {}: {}. Continuing with on-screen log only.",
                    path.display(),
                    e
                );
                LogTarget::Unavailable {
                    path,
                    reason: e.to_string(),
                }
            }
        };

        Self {
            started_at,
            started: Instant::now(),
            target,
            entries: Vec::new(),
            echo: true,
        }
    }

    /// Log that keeps entries in memory only
    pub fn in_memory() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
            target: LogTarget::Memory,
            entries: Vec::new(),
            echo: true,
        }
    }

    /// Disable console echo (tests)
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Path of the log file, if a file target was requested
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            LogTarget::Memory => None,
            LogTarget::File { path, .. } | LogTarget::Unavailable { path, .. } => Some(path),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Append one entry, write it through and echo it.
    ///
    /// Line breaks in `message` are replaced with [`LINE_JOINER`], so the
    /// in-memory entry and the file line always agree.
    pub fn append(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now().naive_local(),
            level,
            message: single_line(message.into()),
        };
        let line = entry.to_line();

        if self.echo {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("[{}] {}", level, entry.message),
                LogLevel::Info | LogLevel::Success => println!("[{}] {}", level, entry.message),
            }
        }
        debug!(level = %level, "{}", entry.message);

        let write_failure = match &mut self.target {
            LogTarget::File { path, file } => writeln!(file, "{}", line)
                .err()
                .map(|e| (path.clone(), e.to_string())),
            LogTarget::Memory | LogTarget::Unavailable { .. } => None,
        };
        if let Some((path, reason)) = write_failure {
            eprintln!(
                "NOTICE: writing to run log {} failed: {}. Continuing with on-screen log only.",
                path.display(),
                reason
            );
            self.target = LogTarget::Unavailable { path, reason };
        }

        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Error, message);
    }

    /// Flush the log file
    pub fn flush(&mut self) -> Result<()> {
        if let LogTarget::File { file, .. } = &mut self.target {
            file.flush()?;
        }
        Ok(())
    }

    /// Reduce the run's entries to a summary.
    ///
    /// # Errors
    ///
    /// - `LogTargetUnavailable` if the file target could not be used
    /// - `EmptyLog` if nothing was logged
    pub fn summary(&self) -> Result<RunSummary> {
        if let LogTarget::Unavailable { path, reason } = &self.target {
            return Err(OrchestratorError::log_target(format!(
                "{}: {}",
                path.display(),
                reason
            )));
        }
        RunSummary::from_entries(&self.entries, self.elapsed())
    }
}

/// Summarize an existing run log file.
///
/// Elapsed time is the span between the first and last entry. Lines that are
/// not in the run log format are ignored.
pub fn summarize_file(path: &Path) -> Result<RunSummary> {
    let content = fs::read_to_string(path)
        .map_err(|e| OrchestratorError::log_target(format!("{}: {}", path.display(), e)))?;

    let entries: Vec<LogEntry> = content.lines().filter_map(LogEntry::parse_line).collect();

    let elapsed = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp)
            .to_std()
            .unwrap_or_default(),
        _ => Duration::ZERO,
    };

    RunSummary::from_entries(&entries, elapsed)
}

/// Counts, duration and verbatim issues of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub successes: usize,
    /// WARNING and INFO entries are counted together
    pub warnings_and_info: usize,
    pub errors: usize,
    pub elapsed: Duration,
    /// Every WARNING and ERROR entry, in log order
    pub issues: Vec<LogEntry>,
}

impl RunSummary {
    pub fn from_entries(entries: &[LogEntry], elapsed: Duration) -> Result<Self> {
        if entries.is_empty() {
            return Err(OrchestratorError::EmptyLog);
        }

        let mut summary = Self {
            successes: 0,
            warnings_and_info: 0,
            errors: 0,
            elapsed,
            issues: Vec::new(),
        };

        for entry in entries {
            match entry.level {
                LogLevel::Success => summary.successes += 1,
                LogLevel::Info => summary.warnings_and_info += 1,
                LogLevel::Warning => {
                    summary.warnings_and_info += 1;
                    summary.issues.push(entry.clone());
                }
                LogLevel::Error => {
                    summary.errors += 1;
                    summary.issues.push(entry.clone());
                }
            }
        }

        Ok(summary)
    }

    /// Messages of every ERROR entry, verbatim
    pub fn error_messages(&self) -> Vec<&str> {
        self.issues_at(LogLevel::Error)
    }

    /// Messages of every WARNING entry, verbatim
    pub fn warning_messages(&self) -> Vec<&str> {
        self.issues_at(LogLevel::Warning)
    }

    fn issues_at(&self, level: LogLevel) -> Vec<&str> {
        self.issues
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// Render the summary for the operator
    pub fn render(&self) -> String {
        let secs = self.elapsed.as_secs();
        let mut out = String::new();
        out.push_str("==================== RUN SUMMARY ====================\n");
        out.push_str(&format!("Successes:        {}\n", self.successes));
        out.push_str(&format!("Warnings/Info:    {}\n", self.warnings_and_info));
        out.push_str(&format!("Errors:           {}\n", self.errors));
        out.push_str(&format!(
            "Duration:         {:02}:{:02}:{:02}\n",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ));

        let errors = self.error_messages();
        if !errors.is_empty() {
            out.push_str("\nErrors:\n");
            for message in errors {
                out.push_str(&format!("  - {}\n", message));
            }
        }

        let warnings = self.warning_messages();
        if !warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for message in warnings {
                out.push_str(&format!("  - {}\n", message));
            }
        }
        out.push_str("=====================================================\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_roundtrip_keeps_separators_in_message() {
        let line = "2024-06-03 09:15:02 - ERROR - Copy failed - file locked";
        let entry = LogEntry::parse_line(line).expect("should parse");
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "Copy failed - file locked");
        assert_eq!(entry.to_line(), line);
    }

    #[test]
    fn test_parse_rejects_foreign_lines() {
        assert!(LogEntry::parse_line("==== RUN SUMMARY ====").is_none());
        assert!(LogEntry::parse_line("2024-06-03 09:15:02 - DEBUG - nope").is_none());
    }

    #[test]
    fn test_summary_counts_and_issues() {
        let mut log = RunLog::in_memory().quiet();
        log.success("Host A reachable");
        log.success("Host B reachable");
        log.success("Path exists");
        log.warning("Process still running on B");
        log.error("Service not found on C");
        log.error("Copy failed: x.tax");

        let summary = log.summary().expect("summary");
        assert_eq!(summary.successes, 3);
        assert_eq!(summary.warnings_and_info, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(
            summary.error_messages(),
            vec!["Service not found on C", "Copy failed: x.tax"]
        );
        let rendered = summary.render();
        assert!(rendered.contains("Service not found on C"));
        assert!(rendered.contains("Process still running on B"));
    }

    #[test]
    fn test_empty_log_is_an_error() {
        let log = RunLog::in_memory().quiet();
        assert!(matches!(log.summary(), Err(OrchestratorError::EmptyLog)));
    }

    #[test]
    fn test_unwritable_target_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file in the way").unwrap();

        let mut log = RunLog::open(&blocker).quiet();
        log.info("still recorded in memory");
        assert_eq!(log.entries().len(), 1);
        assert!(matches!(
            log.summary(),
            Err(OrchestratorError::LogTargetUnavailable(_))
        ));
    }

    #[test]
    fn test_file_target_persists_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::open(dir.path()).quiet();
        log.info("run started");
        log.error("boom");
        log.flush().unwrap();

        let path = log.path().unwrap().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("update_") && name.ends_with(".log"));

        let summary = summarize_file(&path).unwrap();
        assert_eq!(summary.warnings_and_info, 1);
        assert_eq!(summary.error_messages(), vec!["boom"]);
    }

    #[test]
    fn test_multiline_message_stays_one_entry_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::open(dir.path()).quiet();
        log.info("run started");
        log.error(
            "ensure_service_state exited with code 1: Stop-Service : Cannot stop\r\n\
             + CategoryInfo : CloseError\n\n\
             + FullyQualifiedErrorId : StopServiceFailed",
        );
        log.success("run finished");
        log.flush().unwrap();

        let expected = "ensure_service_state exited with code 1: Stop-Service : Cannot stop \
                        | + CategoryInfo : CloseError \
                        | + FullyQualifiedErrorId : StopServiceFailed";
        assert_eq!(log.entries()[1].message, expected);

        let path = log.path().unwrap().to_path_buf();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), log.entries().len());

        let from_memory = log.summary().unwrap();
        let from_file = summarize_file(&path).unwrap();
        assert_eq!(from_file.error_messages(), from_memory.error_messages());
        assert_eq!(from_file.error_messages(), vec![expected]);
        assert_eq!(from_file.successes, 1);
        assert_eq!(from_file.warnings_and_info, 1);
    }

    #[test]
    fn test_runs_in_the_same_second_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = RunLog::open(dir.path()).quiet();
        first.error("first run failed");
        first.flush().unwrap();
        let mut second = RunLog::open(dir.path()).quiet();
        second.success("second run ok");
        second.flush().unwrap();

        let first_path = first.path().unwrap().to_path_buf();
        let second_path = second.path().unwrap().to_path_buf();
        assert_ne!(first_path, second_path);

        let summary = summarize_file(&second_path).unwrap();
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(summarize_file(&first_path).unwrap().errors, 1);
    }

    #[test]
    fn test_existing_log_file_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = create_log_file(dir.path(), "20240603_091502").unwrap();
        let (second, _) = create_log_file(dir.path(), "20240603_091502").unwrap();
        assert_eq!(first.file_name().unwrap(), "update_20240603_091502.log");
        assert_eq!(second.file_name().unwrap(), "update_20240603_091502-1.log");
    }

    #[test]
    fn test_summarize_missing_file_is_log_target_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = summarize_file(&dir.path().join("update_19990101_000000.log"));
        assert!(matches!(result, Err(OrchestratorError::LogTargetUnavailable(_))));
    }

    #[test]
    fn test_summarize_empty_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update_empty.log");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(summarize_file(&path), Err(OrchestratorError::EmptyLog)));

        // foreign lines only: still nothing to summarize
        std::fs::write(&path, "==== RUN SUMMARY ====\n").unwrap();
        assert!(matches!(summarize_file(&path), Err(OrchestratorError::EmptyLog)));
    }
}
