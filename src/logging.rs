//! Diagnostics and the per-run log artifact.
//!
//! - **Tracing**: dev diagnostics via `RUST_LOG`, written to stderr.
//! - **Run log ([`RunLog`])**: every executed git command, warning, error and
//!   console line of one run, flushed to a dated text file on exit.
//! - **Console ([`Console`])**: the user-facing status lines, mirrored into
//!   the run log.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Longest message/detail kept per entry.
const MAX_DETAIL_LENGTH: usize = 2000;

/// Initialize the tracing subscriber. Reads `RUST_LOG`, defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Command,
    Console,
    Progress,
    Warning,
    Error,
}

impl LogSource {
    fn as_str(self) -> &'static str {
        match self {
            LogSource::Command => "git-exec",
            LogSource::Console => "console",
            LogSource::Progress => "progress",
            LogSource::Warning => "warning",
            LogSource::Error => "error",
        }
    }
}

/// One collected entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub source: LogSource,
    pub level: String,
    pub context: Option<String>,
    pub command: Option<String>,
    pub options: Option<Value>,
    pub message: String,
    pub error: String,
}

impl LogEntry {
    fn new(source: LogSource, level: &str, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            source,
            level: level.to_string(),
            context: None,
            command: None,
            options: None,
            message: truncate(message),
            error: String::new(),
        }
    }
}

/// A finished git invocation, as handed over by the executor.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub command: String,
    pub options: Value,
    pub success: bool,
    pub output: String,
    pub error: String,
}

/// Append-only collector for one run. Cloning shares the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A poisoned buffer is still worth flushing.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    pub fn command(&self, record: CommandRecord) {
        let mut entry = LogEntry::new(
            LogSource::Command,
            if record.success { "success" } else { "error" },
            &record.output,
        );
        entry.command = Some(record.command);
        entry.options = Some(record.options);
        entry.error = truncate(&record.error);
        self.push(entry);
    }

    pub fn console(&self, level: &str, message: &str) {
        self.push(LogEntry::new(LogSource::Console, level, message));
    }

    pub fn progress(&self, state: &str, text: &str) {
        self.push(LogEntry::new(LogSource::Progress, state, text));
    }

    pub fn warning(&self, message: &str, context: Option<&str>) {
        let mut entry = LogEntry::new(LogSource::Warning, "warning", message);
        entry.context = context.map(str::to_string);
        self.push(entry);
    }

    pub fn error(&self, message: &str, context: Option<&str>) {
        let mut entry = LogEntry::new(LogSource::Error, "error", message);
        entry.context = context.map(str::to_string);
        self.push(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True once an error was reported. Failed git commands that were only checks do not count.
    pub fn has_errors(&self) -> bool {
        self.lock()
            .iter()
            .any(|e| e.source != LogSource::Command && e.level == "error")
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Write all entries to `<root>/logs/<YYYY-MM>/log-<timestamp>.txt`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when nothing was
    /// collected. The buffer is drained, so a second flush is a no-op.
    pub fn flush(&self, root: &Path) -> std::io::Result<Option<PathBuf>> {
        let entries = std::mem::take(&mut *self.lock());
        if entries.is_empty() {
            return Ok(None);
        }

        let now = Local::now();
        let dir = root.join("logs").join(now.format("%Y-%m").to_string());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("log-{}.txt", now.format("%Y-%m-%d_%H-%M-%S")));

        fs::write(&path, render(&entries, now))?;
        Ok(Some(path))
    }
}

fn render(entries: &[LogEntry], now: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "aicommit run log");
    let _ = writeln!(out, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{}\n", "=".repeat(80));

    for (idx, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "[Entry {}]", idx + 1);
        let _ = writeln!(out, "Time: {}", entry.timestamp.to_rfc3339());
        let _ = writeln!(out, "Source: {}", entry.source.as_str());
        let _ = writeln!(out, "Level: {}", entry.level);
        if let Some(context) = &entry.context {
            let _ = writeln!(out, "Context: {context}");
        }
        if let Some(command) = &entry.command {
            let _ = writeln!(out, "Command: {command}");
        }
        if let Some(options) = &entry.options {
            let _ = writeln!(out, "Options: {options}");
        }
        if !entry.message.is_empty() {
            let _ = writeln!(out, "Message:\n{}", entry.message);
        }
        if !entry.error.is_empty() {
            let _ = writeln!(out, "Error:\n{}", entry.error);
        }
        let _ = writeln!(out, "{}\n", "-".repeat(80));
    }
    out
}

fn truncate(content: &str) -> String {
    if content.chars().count() <= MAX_DETAIL_LENGTH {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_DETAIL_LENGTH).collect();
    format!("{head}\n...[truncated]")
}

/// User-facing status output, mirrored into the run log.
#[derive(Debug, Clone)]
pub struct Console {
    log: RunLog,
}

impl Console {
    pub fn new(log: RunLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        println!("  [INFO] {message}");
        self.log.console("info", message);
    }

    pub fn success(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        println!("  [DONE] {message}");
        self.log.console("success", message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        eprintln!("  [WARN] {message}");
        self.log.console("warn", message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        eprintln!("  [FAIL] {message}");
        self.log.console("error", message);
    }

    /// Announce a step that may take a while; pair with [`Console::finish`].
    pub fn step(&self, text: &str) {
        println!("  {text}...");
        self.log.progress("start", text);
    }

    pub fn finish(&self, text: &str) {
        self.log.progress("stop", text);
    }
}
