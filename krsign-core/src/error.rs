//! Fatal onboarding errors with clear, actionable messages
//!
//! Anything represented here terminates the running command. Failures that
//! only degrade the result (a key upload that did not go through, a keychain
//! import error) are reported as [`crate::steps::StepResult::Failed`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort an onboarding command
#[derive(Error, Debug)]
pub enum OnboardingError {
    /// The background agent answered but is older than this client
    #[error("An old version of the signing agent is running.\n\nRestart it with the latest version and try again:\n  kr restart")]
    AgentNotLatest,

    /// The background agent could not be queried at all
    #[error("The signing agent is not running or could not be reached: {reason}\n\nStart it and try again:\n  kr restart")]
    AgentUnreachable { reason: String },

    /// Global git identity is incomplete
    #[error("Your git name and email are not yet configured. Please run\n  git config --global user.name \"FirstName LastName\"\nand\n  git config --global user.email Email\nbefore running krsign enable")]
    GitUserNotConfigured,

    /// git is not on PATH
    #[error("git could not be found, please make sure you have git installed and on your PATH")]
    GitNotInstalled,

    /// The forced identity refresh failed
    #[error("Failed to fetch your identity from the signing agent: {reason}")]
    IdentityFetch { reason: String },

    /// The paired device has not produced a PGP public key
    #[error("You do not yet have a PGP public key. Make sure you have the latest version of the Krypton app and try again.")]
    NoPublicKey,

    /// The signing helper binary is not installed
    #[error("Could not find {helper} on your PATH. Reinstall the signing agent and try again.")]
    SigningHelperNotFound { helper: String },

    /// A mandatory git configuration write failed
    #[error("Failed to set git config {key}:\n{output}")]
    ConfigWrite { key: String, output: String },

    /// Auto-signing was requested but no usable signing program is configured
    #[error("Code signing is not set up yet. Run\n  krsign enable\nfirst.")]
    SigningNotConfigured,

    /// The scratch repository for the self-test could not be prepared
    #[error("Failed to prepare a scratch repository in {path}")]
    SelfTestSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OnboardingError {
    /// Log the error before the process exits
    pub fn log(&self) {
        match self {
            OnboardingError::AgentNotLatest | OnboardingError::AgentUnreachable { .. } => {
                tracing::error!(target: "agent", "precondition failed: {}", self);
            }
            _ => tracing::error!("{}", self),
        }
    }
}
