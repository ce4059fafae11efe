//! Porcelain status parsing and conflict classification.

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter XY status code, e.g. `"UU"`, `" M"`, `"??"`.
    pub code: String,
    /// Path relative to the repository root.
    pub path: String,
}

impl StatusEntry {
    /// Both sides touched the path and git left it unmerged.
    pub fn is_unmerged(&self) -> bool {
        matches!(self.code.as_str(), "UU" | "AA" | "DD")
    }

    /// Modified in the index or the work tree (`M `, ` M`, `MM`).
    pub fn is_modified(&self) -> bool {
        self.code.trim_start().starts_with('M')
    }
}

/// Parse porcelain v1 output. Output must not be trimmed: the leading
/// space of ` M` is part of the status code.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .filter_map(|line| {
            let code = line.get(..2)?;
            let path = line.get(2..)?.trim();
            if path.is_empty() {
                return None;
            }
            Some(StatusEntry {
                code: code.to_string(),
                path: unquote(path),
            })
        })
        .collect()
}

/// Porcelain quotes paths containing spaces or special characters, C-style.
/// With `core.quotePath` (the default) non-ASCII bytes arrive as `\nnn`
/// octal escapes.
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let Some((&escaped, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        match escaped {
            b'0'..=b'7' => {
                let digits = rest
                    .iter()
                    .take(2)
                    .take_while(|d| (b'0'..=b'7').contains(*d))
                    .count();
                let value = rest[..digits]
                    .iter()
                    .fold(u32::from(escaped - b'0'), |acc, d| acc * 8 + u32::from(d - b'0'));
                bytes.push(value as u8);
                rest = &rest[digits..];
            }
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Status split into the two sets the conflict check cares about.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusClassification {
    /// `UU`/`AA`/`DD` paths.
    pub unmerged: Vec<String>,
    /// Modified paths to scan for textual markers.
    pub modified: Vec<String>,
}

impl StatusClassification {
    pub fn from_entries(entries: &[StatusEntry]) -> Self {
        let mut classification = Self::default();
        for entry in entries {
            if entry.is_unmerged() {
                classification.unmerged.push(entry.path.clone());
            } else if entry.is_modified() {
                classification.modified.push(entry.path.clone());
            }
        }
        classification
    }
}

/// Conflict history of one run.
///
/// `Clean` means no conflict round has been seen. `Ignored` means the only
/// hits so far were outside the working prefix. `Rounds(n)` counts rounds
/// that found unmerged paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictState {
    #[default]
    Clean,
    Ignored,
    Rounds(u32),
}

impl ConflictState {
    /// Whether staging needs the user's confirmation first.
    pub fn is_active(self) -> bool {
        matches!(self, ConflictState::Rounds(n) if n > 0)
    }

    /// Record a check that found ignorable paths only. Has no effect once a
    /// real round was counted.
    pub fn mark_ignored(&mut self) {
        if *self == ConflictState::Clean {
            *self = ConflictState::Ignored;
        }
    }

    /// Record one more round with unmerged paths.
    pub fn record_round(&mut self) {
        *self = match *self {
            ConflictState::Rounds(n) => ConflictState::Rounds(n + 1),
            ConflictState::Clean | ConflictState::Ignored => ConflictState::Rounds(1),
        };
    }
}
