//! Interactive questions asked during a run.

use dialoguer::{Confirm, MultiSelect};

/// Terminal interaction, behind a trait so workflows can be driven in tests.
pub trait Prompter {
    /// Yes/no question.
    fn confirm(&self, message: &str, default: bool) -> dialoguer::Result<bool>;

    /// Pick any number of `items`; returns the chosen indices.
    fn select_many(&self, message: &str, items: &[String]) -> dialoguer::Result<Vec<usize>>;
}

/// [`Prompter`] on the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, message: &str, default: bool) -> dialoguer::Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
    }

    fn select_many(&self, message: &str, items: &[String]) -> dialoguer::Result<Vec<usize>> {
        MultiSelect::new()
            .with_prompt(message)
            .items(items)
            .interact()
    }
}
