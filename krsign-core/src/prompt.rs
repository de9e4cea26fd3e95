//! Confirmation policy - interactive prompts versus default acceptance
//!
//! Every optional onboarding step asks the policy once. `AlwaysYes` accepts
//! without touching stdin, which is what unattended runs rely on.

use std::io::{self, BufRead};

use crate::report::StatusReporter;

/// Source of user answers
pub trait Prompter: Send + Sync {
    /// Read one line of input; `Ok(None)` at end of input
    fn read_line(&self) -> io::Result<Option<String>>;
}

/// Reads answers from the process's standard input
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }
}

/// How optional steps are decided
pub enum ConfirmationPolicy {
    /// Accept every optional step, never read input
    AlwaysYes,
    /// Ask the user
    PromptUser(Box<dyn Prompter>),
}

impl ConfirmationPolicy {
    pub fn interactive() -> Self {
        ConfirmationPolicy::PromptUser(Box::new(StdinPrompter))
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, ConfirmationPolicy::PromptUser(_))
    }

    /// Ask a yes/no question; anything but y/yes (or end of input) is a no
    pub fn confirm(&self, reporter: &StatusReporter, question: &str) -> bool {
        match self {
            ConfirmationPolicy::AlwaysYes => true,
            ConfirmationPolicy::PromptUser(prompter) => {
                reporter.raw(format_args!("{question} [y/N] "));
                match prompter.read_line() {
                    Ok(Some(answer)) => {
                        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
                    }
                    Ok(None) => false,
                    Err(e) => {
                        tracing::debug!("Failed to read answer: {}", e);
                        false
                    }
                }
            }
        }
    }

    /// Show a message and wait for ENTER; returns immediately under `AlwaysYes`
    pub fn acknowledge(&self, reporter: &StatusReporter, message: &str) {
        if let ConfirmationPolicy::PromptUser(prompter) = self {
            reporter.line(message);
            reporter.raw("Press ENTER to continue");
            if let Err(e) = prompter.read_line() {
                tracing::debug!("Failed to read acknowledgment: {}", e);
            }
            reporter.blank();
        }
    }
}
