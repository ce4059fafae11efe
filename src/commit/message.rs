//! Commit message grammar and cleanup of raw model output.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Allowed `<type>` values.
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Paragraph limit of the first extraction pass.
const DEFAULT_PARAGRAPHS: usize = 3;

/// Paragraph limit of the final message: subject and body.
const MESSAGE_PARAGRAPHS: usize = 2;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("Invalid regex"));

/// `type(scope): ...` where scope is the committer's user name.
#[derive(Debug, Clone)]
pub struct CommitGrammar {
    scope: String,
    regex: Regex,
}

impl CommitGrammar {
    pub fn new(scope: &str) -> Self {
        let pattern = format!(
            r"^({})\({}\):",
            COMMIT_TYPES.join("|"),
            regex_lite::escape(scope)
        );
        let regex = Regex::new(&pattern).expect("escaped commit grammar is valid");
        Self {
            scope: scope.to_string(),
            regex,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

/// Clean raw model output into `type(scope): subject` plus an optional body.
///
/// Never fails; the result may be empty or still not match `grammar`, which
/// the caller must check.
pub fn format_message(raw: &str, grammar: &CommitGrammar) -> String {
    let without_reasoning = match raw.rfind("</think>") {
        Some(pos) => &raw[pos + "</think>".len()..],
        None => raw,
    };

    let mut text = strip_to_grammar(without_reasoning.trim(), grammar);
    if text.is_empty() {
        return String::new();
    }
    if let Some(pos) = text.find("```") {
        text = &text[..pos];
    }
    if let Some(pos) = text.find("---") {
        text = &text[..pos];
    }

    let once = first_paragraphs(text, DEFAULT_PARAGRAPHS);
    first_paragraphs(&once, MESSAGE_PARAGRAPHS).trim().to_string()
}

/// Drop leading characters until the rest matches the grammar.
fn strip_to_grammar<'a>(text: &'a str, grammar: &CommitGrammar) -> &'a str {
    text.char_indices()
        .map(|(idx, _)| &text[idx..])
        .find(|rest| grammar.is_match(rest))
        .unwrap_or("")
}

/// Keep the first `count` non-empty paragraphs that are not `// ` comments.
fn first_paragraphs(text: &str, count: usize) -> String {
    let normalized = join_bullet_lists(&normalize_placeholders(text));
    PARAGRAPH_BREAK
        .split(&normalized)
        .filter(|para| !para.trim().is_empty() && !para.starts_with("// "))
        .take(count)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turn the prompt's `<BLANK LINE>` / `<body>` placeholders into real
/// paragraph breaks.
fn normalize_placeholders(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| match line.trim() {
            "<BLANK LINE>" | "<body>" | "body" if idx > 0 => "",
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_bullet(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("- ") || line.starts_with("* ")
}

/// Remove blank lines sitting between two bullet items, so a list the model
/// spaced out stays one paragraph.
fn join_bullet_lists(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut kept = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            let prev_bullet = kept.last().is_some_and(|prev: &&str| is_bullet(prev));
            let next_bullet = lines[idx + 1..]
                .iter()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|next| is_bullet(next));
            if prev_bullet && next_bullet {
                continue;
            }
        }
        kept.push(*line);
    }
    kept.join("\n")
}
