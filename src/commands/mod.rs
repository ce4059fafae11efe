//! CLI command handlers. Each takes its validated input plus the settings
//! store and console, acts, and reports.

pub mod commit;
pub mod settings;

use std::time::Duration;

pub use settings::{PingReport, mask_key, parse_max_token};

/// Runs longer than this are reported as "took" rather than "finished in".
const SLOW_RUN: Duration = Duration::from_secs(10);

/// Elapsed-time line printed when a command exits.
pub fn elapsed_summary(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if elapsed > SLOW_RUN {
        format!("Command took {secs:.3}s")
    } else {
        format!("Command finished in {secs:.3}s")
    }
}
