//! Onboarding step sequence
//!
//! Steps run strictly in order, each to completion before the next starts.
//! Preconditions return `Result<_, OnboardingError>` and abort the run.
//! Every other step returns a [`StepResult`]; the driver reports it and moves
//! on, so one failed step never prevents the rest from being attempted.
//!
//! Steps print their own progress lines. The driver only adds the failure
//! line for [`StepResult::Failed`].

mod optional;
mod preconditions;

use std::fmt;
use tracing::{debug, info, warn};

use crate::context::SetupContext;
use crate::git_config::{COMMIT_GPG_SIGN, TAG_FORCE_SIGN_ANNOTATED};
use crate::identity::Identity;
use crate::prompt::ConfirmationPolicy;

pub use optional::{OptionalStep, OPTIONAL_STEPS};

/// Outcome of one non-fatal step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl StepResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }
}

/// Labels for steps whose results are reported rather than fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepName {
    GitLocation,
    PublishHint,
    KeyServerUpload,
    AutoSign,
    LocalKeychain,
    ShellExport,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepName::GitLocation => "git-location",
            StepName::PublishHint => "publish-hint",
            StepName::KeyServerUpload => "keyserver-upload",
            StepName::AutoSign => "auto-sign",
            StepName::LocalKeychain => "local-keychain",
            StepName::ShellExport => "shell-export",
        };
        f.write_str(name)
    }
}

/// The ordered onboarding steps bound to one run's collaborators and policy
pub struct StepSequence<'c, 'a> {
    pub(crate) ctx: &'c SetupContext<'a>,
    pub(crate) policy: &'c ConfirmationPolicy,
}

impl<'c, 'a> StepSequence<'c, 'a> {
    pub fn new(ctx: &'c SetupContext<'a>, policy: &'c ConfirmationPolicy) -> Self {
        Self { ctx, policy }
    }

    /// Report a step outcome and hand it back
    pub fn record(&self, step: StepName, result: StepResult) -> (StepName, StepResult) {
        match &result {
            StepResult::Succeeded => info!(step = %step, "step succeeded"),
            StepResult::Skipped(reason) => debug!(step = %step, reason = %reason, "step skipped"),
            StepResult::Failed(message) => {
                warn!(step = %step, "step failed");
                self.ctx.reporter.failure(message);
            }
        }
        (step, result)
    }

    /// Run the optional steps in order
    pub async fn run_optional(&self, identity: &Identity) -> Vec<(StepName, StepResult)> {
        let mut results = Vec::with_capacity(OPTIONAL_STEPS.len());
        for &step in OPTIONAL_STEPS {
            let result = self.run_step(step, identity).await;
            results.push(self.record(step.name(), result));
        }
        results
    }

    async fn run_step(&self, step: OptionalStep, identity: &Identity) -> StepResult {
        match step {
            OptionalStep::PublishHint => self.publish_hint(identity),
            OptionalStep::KeyServerUpload => self.upload_to_keyserver(identity).await,
            OptionalStep::AutoSign => self.offer_auto_sign().await,
            OptionalStep::LocalKeychain => self.import_to_local_keychain(identity).await,
            OptionalStep::ShellExport => self.ensure_tty_export(),
        }
    }

    /// Turn on both signing flags, or neither
    ///
    /// git has no multi-key transaction, so a failed second write undoes the
    /// first one.
    pub async fn enable_auto_sign(&self) -> StepResult {
        let config = self.ctx.git_config();

        if let Err(e) = config.set(COMMIT_GPG_SIGN, "true").await {
            return StepResult::Failed(format!(
                "Failed to enable automatic commit signing: {}",
                e.output
            ));
        }

        if let Err(e) = config.set(TAG_FORCE_SIGN_ANNOTATED, "true").await {
            let rollback = match config.unset(COMMIT_GPG_SIGN).await {
                Ok(()) => String::new(),
                Err(undo) => format!(
                    "\n{} could not be reverted and is still enabled: {}",
                    COMMIT_GPG_SIGN, undo.output
                ),
            };
            return StepResult::Failed(format!(
                "Failed to enable signing of annotated tags: {}{}",
                e.output, rollback
            ));
        }

        self.ctx.reporter.success(
            "Automatic commit signing enabled, disable by running krsign disable",
        );
        StepResult::Succeeded
    }
}
