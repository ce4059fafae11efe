//! Ctrl+C handling for one command run.

use std::path::PathBuf;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::logging::Console;

/// Exit status after an interrupt (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Listens for Ctrl+C while alive. On interrupt the run log is flushed and
/// the process exits with [`INTERRUPTED_EXIT_CODE`]. Dropping the guard
/// removes the listener.
pub struct InterruptGuard {
    handle: JoinHandle<()>,
}

impl InterruptGuard {
    /// Must be called inside a tokio runtime.
    pub fn install(console: Console, log_root: Option<PathBuf>) -> Self {
        let handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                debug!("could not listen for Ctrl+C");
                return;
            }
            console.warn("Interrupted");
            if let Some(root) = log_root {
                report_flush(&console, &root);
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        });
        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Write the run log and print its location when errors were collected.
pub fn report_flush(console: &Console, root: &std::path::Path) {
    let has_errors = console.log().has_errors();
    match console.log().flush(root) {
        Ok(Some(path)) if has_errors => eprintln!("Log written to {}", path.display()),
        Ok(_) => {}
        Err(e) => eprintln!("Failed to write the log file: {e}"),
    }
}
