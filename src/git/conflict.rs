//! Textual conflict-marker detection.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

/// Outcome of one scan. A path lands in at most one list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConflictScan {
    /// Files containing all three conflict markers as whole lines.
    pub conflicted: Vec<String>,
    /// Files outside `scope`, or that could not be read.
    pub ignored: Vec<String>,
}

impl ConflictScan {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicted.is_empty()
    }
}

static START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^<<<<<<< ").expect("Invalid regex"));
static MIDDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^=======\r?$").expect("Invalid regex"));
static END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>>>>>>> ").expect("Invalid regex"));

/// True when `content` holds a start, middle and end marker line, in any order.
pub fn has_conflict_markers(content: &str) -> bool {
    START.is_match(content) && MIDDLE.is_match(content) && END.is_match(content)
}

/// Classify `paths` (relative to `root`) as conflicted or ignored.
///
/// With a non-empty `scope`, paths not starting with it are ignored without
/// being read. Duplicate paths are visited once.
pub fn scan_conflicts<I, S>(paths: I, scope: &str, root: &Path) -> ConflictScan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
    let mut scan = ConflictScan::default();

    for path in unique {
        if !scope.is_empty() && !path.starts_with(scope) {
            scan.ignored.push(path);
            continue;
        }

        match fs::read_to_string(root.join(&path)) {
            Ok(content) if has_conflict_markers(&content) => scan.conflicted.push(path),
            Ok(_) => {}
            Err(e) => {
                debug!(path = %path, error = %e, "unreadable, not a conflict file");
                scan.ignored.push(path);
            }
        }
    }

    scan
}
